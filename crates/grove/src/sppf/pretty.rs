use crate::sppf::{NodeRef, SharedPackedParseTree};
use std::fmt::{self, Write};

/// Compact single-line form: `name{child child | child}` for branches,
/// `'text'` for leaves and `<EMPTY>` for the empty leaf.
impl fmt::Display for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_compact(f, *self)
    }
}

impl fmt::Display for SharedPackedParseTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_compact(f, self.root())
    }
}

fn write_compact(out: &mut impl Write, node: NodeRef<'_>) -> fmt::Result {
    let Ok(branch) = node.as_branch() else {
        return write_leaf(out, node);
    };
    write!(out, "{}{{", branch.name())?;
    for (index, alternative) in branch.alternatives().enumerate() {
        if index > 0 {
            out.write_str(" | ")?;
        }
        for (position, child) in alternative.children().enumerate() {
            if position > 0 {
                out.write_char(' ')?;
            }
            write_compact(out, child)?;
        }
    }
    out.write_char('}')
}

fn write_leaf(out: &mut impl Write, node: NodeRef<'_>) -> fmt::Result {
    if node.is_empty_leaf() {
        out.write_str(node.name())
    } else {
        write!(out, "'{}'", node.matched_text())
    }
}

impl NodeRef<'_> {
    /// Multi-line form with one node per line and spans
    ///
    /// Ambiguous branches list each alternative under an `| option n` line.
    #[must_use]
    pub fn to_string_indented(&self) -> String {
        let mut out = String::new();
        let _ = write_indented(&mut out, *self, 0);
        out
    }
}

impl SharedPackedParseTree {
    #[must_use]
    pub fn to_string_indented(&self) -> String {
        self.root().to_string_indented()
    }
}

fn write_indented(out: &mut String, node: NodeRef<'_>, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    let Ok(branch) = node.as_branch() else {
        out.push_str(&indent);
        write_leaf(out, node)?;
        return writeln!(out, " {}", node.range());
    };

    writeln!(out, "{indent}{} {}", branch.name(), branch.range())?;
    if branch.is_ambiguous() {
        for alternative in branch.alternatives() {
            writeln!(out, "{indent}  | option {}", alternative.option())?;
            for child in alternative.children() {
                write_indented(out, child, depth + 2)?;
            }
        }
    } else {
        for child in branch.children() {
            write_indented(out, child, depth + 1)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::grammar::{Expr, GrammarBuilder};
    use crate::parser::ScannerlessParser;

    #[test]
    fn test_compact_and_indented() {
        let grammar = GrammarBuilder::new("test", "Pretty")
            .rule(
                "ab",
                Expr::concatenation([Expr::non_terminal("a"), Expr::literal("b")]),
            )
            .rule("a", Expr::literal("a"))
            .build()
            .expect("valid grammar");
        let tree = ScannerlessParser::new(&grammar)
            .expect("compiles")
            .parse("ab", "ab")
            .expect("parses");

        assert_eq!(tree.to_string(), "ab{a{'a'} 'b'}");
        assert_eq!(
            tree.to_string_indented(),
            "ab 0..2\n  a 0..1\n    'a' 0..1\n  'b' 1..2\n"
        );
    }

    #[test]
    fn test_ambiguous_indented() {
        let grammar = GrammarBuilder::new("test", "Ambiguous")
            .rule(
                "S",
                Expr::choice([Expr::non_terminal("x"), Expr::non_terminal("y")]),
            )
            .rule("x", Expr::literal("a"))
            .rule("y", Expr::literal("a"))
            .build()
            .expect("valid grammar");
        let tree = ScannerlessParser::new(&grammar)
            .expect("compiles")
            .parse("S", "a")
            .expect("parses");

        assert_eq!(tree.to_string(), "S{x{'a'} | y{'a'}}");
        assert_eq!(
            tree.to_string_indented(),
            "S 0..1\n  | option 0\n    x 0..1\n      'a' 0..1\n  | option 1\n    y 0..1\n      'a' 0..1\n"
        );
    }
}
