use super::AstLanguage;

/// TypeScript family grammar (covers plain JavaScript as well).
pub static TYPESCRIPT: AstLanguage = AstLanguage {
    name: "typescript",
    extensions: &["ts", "tsx", "js", "jsx"],
    language: || tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
    units_query: r#"
    (function_declaration
        name: (identifier) @name
    ) @function

    (variable_declarator
        name: (identifier) @name
        value: (arrow_function)
    ) @named_arrow

    (class_declaration
        name: (type_identifier) @name
    ) @class

    (class_declaration
        name: (type_identifier) @class_name
        body: (class_body
            (method_definition
                name: (property_identifier) @method_name
            ) @method
        )
    )
    "#,
    loop_kinds: &[
        "for_statement",
        "for_in_statement",
        "while_statement",
        "do_statement",
    ],
};
