use std::path::Path;

/// Languages the scanner understands, each backed by a tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceLanguage {
    Rust,
    Python,
    TypeScript,
    Tsx,
    JavaScript,
    Go,
    Java,
}

impl SourceLanguage {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str())? {
            "rs" => Some(SourceLanguage::Rust),
            "py" => Some(SourceLanguage::Python),
            "ts" => Some(SourceLanguage::TypeScript),
            "tsx" => Some(SourceLanguage::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(SourceLanguage::JavaScript),
            "go" => Some(SourceLanguage::Go),
            "java" => Some(SourceLanguage::Java),
            _ => None,
        }
    }

    /// Name recorded on `SourceFile::language`.
    pub fn name(self) -> &'static str {
        match self {
            SourceLanguage::Rust => "rust",
            SourceLanguage::Python => "python",
            SourceLanguage::TypeScript | SourceLanguage::Tsx => "typescript",
            SourceLanguage::JavaScript => "javascript",
            SourceLanguage::Go => "go",
            SourceLanguage::Java => "java",
        }
    }

    pub fn grammar(self) -> tree_sitter::Language {
        match self {
            SourceLanguage::Rust => tree_sitter_rust::LANGUAGE.into(),
            SourceLanguage::Python => tree_sitter_python::LANGUAGE.into(),
            SourceLanguage::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            SourceLanguage::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            SourceLanguage::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            SourceLanguage::Go => tree_sitter_go::LANGUAGE.into(),
            SourceLanguage::Java => tree_sitter_java::LANGUAGE.into(),
        }
    }

    /// Node kinds that open a function body for complexity attribution.
    pub(crate) fn function_kinds(self) -> &'static [&'static str] {
        match self {
            SourceLanguage::Rust => &["function_item", "closure_expression"],
            SourceLanguage::Python => &["function_definition", "lambda"],
            SourceLanguage::TypeScript | SourceLanguage::Tsx | SourceLanguage::JavaScript => &[
                "function_declaration",
                "function_expression",
                "function",
                "generator_function_declaration",
                "arrow_function",
                "method_definition",
            ],
            SourceLanguage::Go => &["function_declaration", "method_declaration", "func_literal"],
            SourceLanguage::Java => &[
                "method_declaration",
                "constructor_declaration",
                "lambda_expression",
            ],
        }
    }

    /// Node kinds that always add one decision point.
    pub(crate) fn decision_kinds(self) -> &'static [&'static str] {
        match self {
            SourceLanguage::Rust => &[
                "if_expression",
                "while_expression",
                "for_expression",
                "match_arm",
            ],
            SourceLanguage::Python => &[
                "if_statement",
                "elif_clause",
                "for_statement",
                "while_statement",
                "except_clause",
                "conditional_expression",
                "boolean_operator",
                "if_clause",
            ],
            SourceLanguage::TypeScript | SourceLanguage::Tsx | SourceLanguage::JavaScript => &[
                "if_statement",
                "for_statement",
                "for_in_statement",
                "while_statement",
                "do_statement",
                "switch_case",
                "catch_clause",
                "ternary_expression",
            ],
            SourceLanguage::Go => &[
                "if_statement",
                "for_statement",
                "expression_case",
                "type_case",
                "communication_case",
            ],
            SourceLanguage::Java => &[
                "if_statement",
                "for_statement",
                "enhanced_for_statement",
                "while_statement",
                "do_statement",
                "catch_clause",
                "ternary_expression",
            ],
        }
    }

    /// Binary operators that count as a decision point.
    pub(crate) fn short_circuit_operators(self) -> &'static [&'static str] {
        match self {
            SourceLanguage::TypeScript | SourceLanguage::Tsx | SourceLanguage::JavaScript => {
                &["&&", "||", "??"]
            }
            SourceLanguage::Python => &[],
            _ => &["&&", "||"],
        }
    }
}
