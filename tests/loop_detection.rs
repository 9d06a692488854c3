use costlens::config::EngineConfig;
use costlens::detector::detect;
use costlens::graph::{CostImpact, Severity};

fn run(source: &str, language: &str) -> Vec<costlens::graph::OptimizationSuggestion> {
    detect(source, language, "fixture", &EngineConfig::default())
}

#[test]
fn test_ts_llm_call_in_for_loop_flagged() {
    let source = r#"
import OpenAI from 'openai';

const client = new OpenAI();
const prompts = ['a', 'b', 'c'];

export async function summarize() {
    for (const prompt of prompts) {
        const res = await client.chat.completions.create({
            model: 'gpt-4o',
            messages: [{ role: 'user', content: prompt }],
        });
        console.log(res);
    }
}
"#;
    let suggestions = run(source, "typescript");
    assert_eq!(suggestions.len(), 1);
    let suggestion = &suggestions[0];
    assert_eq!(suggestion.severity, Severity::Warning);
    assert_eq!(suggestion.cost_impact, CostImpact::High);
    assert_eq!(suggestion.location.start_line, 9);
    assert!(suggestion.title.contains("chat.completions.create"));
    assert!(suggestion.action.is_some());
}

#[test]
fn test_ts_same_call_outside_loop_not_flagged() {
    let source = r#"
export async function summarizeOnce(prompt: string) {
    return client.chat.completions.create({
        model: 'gpt-4o',
        messages: [{ role: 'user', content: prompt }],
    });
}
"#;
    assert!(run(source, "typescript").is_empty());
}

#[test]
fn test_ts_classic_for_and_do_while() {
    let source = r#"
for (let i = 0; i < n; i++) {
    stripe.charges.create({ amount: fees[i] });
}
do {
    db.rows.query(sql);
} while (more);
"#;
    let suggestions = run(source, "typescript");
    assert_eq!(suggestions.len(), 2);
}

#[test]
fn test_python_indented_call_under_for_flagged() {
    let source = r#"
import requests

def crawl(urls):
    for url in urls:
        page = requests.get(url)
        store(page)
"#;
    let suggestions = run(source, "python");
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].location.start_line, 6);
    assert_eq!(suggestions[0].severity, Severity::Warning);
    assert_eq!(suggestions[0].cost_impact, CostImpact::High);
}

#[test]
fn test_python_call_at_header_indent_after_loop_not_flagged() {
    let source = r#"
def crawl(urls):
    for url in urls:
        count += 1
    requests.get(status_url)
"#;
    assert!(run(source, "python").is_empty());
}

#[test]
fn test_python_nested_loops_inner_call_flagged_once() {
    let source = r#"
def sync(tables):
    for table in tables:
        for row in table:
            dynamodb.scan(TableName=row)
"#;
    let suggestions = run(source, "python");
    assert_eq!(suggestions.len(), 1);
    assert!(suggestions[0].title.contains("dynamodb.scan"));
}

#[test]
fn test_python_blank_lines_inside_loop_body() {
    let source = r#"
for item in items:
    prepare(item)

    openai.ChatCompletion.create(model="gpt-3.5-turbo", messages=[item])
"#;
    let suggestions = run(source, "python");
    assert_eq!(suggestions.len(), 1);
}

#[test]
fn test_detector_ignores_comments() {
    let source = r#"
for item in items:
    # requests.get(item) used to live here
    process(item)
"#;
    assert!(run(source, "python").is_empty());
}

#[test]
fn test_detector_is_stateless_and_repeatable() {
    let source = "for (const x of xs) { axios.get(x); }\n";
    let first = run(source, "typescript");
    let second = run(source, "typescript");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, second[0].id);
    assert_eq!(first[0].location, second[0].location);
}
