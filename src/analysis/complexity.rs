use crate::analysis::language::SourceLanguage;
use crate::models::snapshot::{FunctionComplexity, ParseFailure};
use tree_sitter::{Node, Parser};

/// Per-function complexity plus the first syntax error, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileComplexity {
    pub functions: Vec<FunctionComplexity>,
    pub parse_error: Option<ParseFailure>,
}

/// Cyclomatic complexity by tree-sitter node counting:
/// `complexity = decision_points + 1` for every function-like node.
///
/// Decisions inside a nested function count toward the nested function
/// only; decisions at module level are not attributed. A tree with error
/// nodes is still measured, with the first error reported alongside.
pub fn analyze_complexity(source: &str, language: SourceLanguage) -> FileComplexity {
    let mut parser = Parser::new();
    if let Err(e) = parser.set_language(&language.grammar()) {
        log::warn!("tree-sitter grammar for {} unavailable: {}", language.name(), e);
        return FileComplexity {
            functions: Vec::new(),
            parse_error: Some(ParseFailure {
                line: 1,
                message: format!("grammar unavailable: {}", e),
            }),
        };
    }

    let Some(tree) = parser.parse(source, None) else {
        return FileComplexity {
            functions: Vec::new(),
            parse_error: Some(ParseFailure {
                line: 1,
                message: "parser produced no tree".to_string(),
            }),
        };
    };

    let root = tree.root_node();
    let parse_error = if root.has_error() {
        first_error(root)
    } else {
        None
    };

    FileComplexity {
        functions: count_functions(root, source, language),
        parse_error,
    }
}

fn count_functions(root: Node<'_>, source: &str, language: SourceLanguage) -> Vec<FunctionComplexity> {
    let function_kinds = language.function_kinds();
    let decision_kinds = language.decision_kinds();
    let operators = language.short_circuit_operators();

    let mut functions: Vec<FunctionComplexity> = Vec::new();
    // Pre-order walk; children pushed in reverse so functions come out in
    // source order.
    let mut stack: Vec<(Node<'_>, Option<usize>)> = vec![(root, None)];

    while let Some((node, owner)) = stack.pop() {
        let kind = node.kind();
        let mut current = owner;

        if function_kinds.contains(&kind) {
            functions.push(FunctionComplexity {
                name: function_name(node, source),
                line: node.start_position().row + 1,
                complexity: 1,
            });
            current = Some(functions.len() - 1);
        } else if let Some(idx) = current {
            if is_decision(node, kind, decision_kinds, operators, source, language) {
                functions[idx].complexity += 1;
            }
        }

        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children.into_iter().rev() {
            stack.push((child, current));
        }
    }

    functions
}

fn is_decision(
    node: Node<'_>,
    kind: &str,
    decision_kinds: &[&str],
    operators: &[&str],
    source: &str,
    language: SourceLanguage,
) -> bool {
    if decision_kinds.contains(&kind) {
        return true;
    }
    if language == SourceLanguage::Java && kind == "switch_label" {
        let text = node.utf8_text(source.as_bytes()).unwrap_or("");
        return !text.trim_start().starts_with("default");
    }
    if kind == "binary_expression" && !operators.is_empty() {
        if let Some(op) = node.child_by_field_name("operator") {
            return operators.contains(&op.kind());
        }
    }
    false
}

fn function_name(node: Node<'_>, source: &str) -> String {
    let named = node.child_by_field_name("name").or_else(|| {
        // `const handler = () => ...` takes the binding's name.
        node.parent()
            .filter(|p| p.kind() == "variable_declarator")
            .and_then(|p| p.child_by_field_name("name"))
    });

    named
        .and_then(|n| n.utf8_text(source.as_bytes()).ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| "<anonymous>".to_string())
}

fn first_error(root: Node<'_>) -> Option<ParseFailure> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let message = if node.is_missing() {
                format!("missing {}", node.kind())
            } else {
                "syntax error".to_string()
            };
            return Some(ParseFailure {
                line: node.start_position().row + 1,
                message,
            });
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    None
}
