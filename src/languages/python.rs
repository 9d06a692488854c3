use super::IndentLanguage;

/// Python is scanned heuristically: `def`/`class` headers with indentation
/// tracking instead of a full parse. Granularity is degraded but the unit
/// semantics match the AST strategy.
pub static PYTHON: IndentLanguage = IndentLanguage {
    name: "python",
    extensions: &["py"],
    function_keyword: "def",
    class_keyword: "class",
    import_prefixes: &["import ", "from "],
    loop_keywords: &["for", "while"],
    comment_prefix: "#",
};
