use crate::error::GrammarError;
use crate::grammar::Expr;
use compact_str::CompactString;
use hashbrown::HashSet;

/// Validate the shape of a rule's right-hand side
///
/// # Errors
///
/// Returns an error for empty concatenations or choices, empty literals,
/// repetitions with `min > max`, and separated lists whose separator is not
/// a non-empty literal.
pub fn validate_expr(rule: &str, expr: &Expr) -> Result<(), GrammarError> {
    match expr {
        Expr::Literal(text) if text.is_empty() => Err(GrammarError::EmptyLiteral {
            rule: rule.to_string(),
        }),
        Expr::Literal(_) | Expr::Pattern(_) | Expr::NonTerminal(_) => Ok(()),
        Expr::Concatenation(items) => {
            if items.is_empty() {
                return Err(GrammarError::EmptyConcatenation {
                    rule: rule.to_string(),
                });
            }
            items.iter().try_for_each(|item| validate_expr(rule, item))
        }
        Expr::Choice(alternatives) | Expr::PriorityChoice(alternatives) => {
            if alternatives.is_empty() {
                return Err(GrammarError::EmptyChoice {
                    rule: rule.to_string(),
                });
            }
            alternatives
                .iter()
                .try_for_each(|alternative| validate_expr(rule, alternative))
        }
        Expr::Group(inner) => validate_expr(rule, inner),
        Expr::Multi { item, min, max } => {
            check_bounds(rule, *min, *max)?;
            validate_expr(rule, item)
        }
        Expr::SeparatedList {
            item,
            separator,
            min,
            max,
        } => {
            check_bounds(rule, *min, *max)?;
            match separator.as_ref() {
                Expr::Literal(text) if !text.is_empty() => {}
                _ => {
                    return Err(GrammarError::InvalidSeparator {
                        rule: rule.to_string(),
                    })
                }
            }
            validate_expr(rule, item)
        }
    }
}

fn check_bounds(rule: &str, min: usize, max: Option<usize>) -> Result<(), GrammarError> {
    match max {
        Some(max) if max < min => Err(GrammarError::InvalidMultiplicity {
            rule: rule.to_string(),
            min,
            max,
        }),
        _ => Ok(()),
    }
}

/// Fail on the first rule name declared twice
///
/// # Errors
///
/// Returns [`GrammarError::DuplicateRule`] naming the repeated rule.
pub fn check_unique_names<'a, I>(grammar: &str, names: I) -> Result<(), GrammarError>
where
    I: IntoIterator<Item = &'a CompactString>,
{
    let mut seen: HashSet<&str, ahash::RandomState> = HashSet::default();
    for name in names {
        if !seen.insert(name.as_str()) {
            return Err(GrammarError::DuplicateRule {
                name: name.to_string(),
                grammar: grammar.to_string(),
            });
        }
    }
    Ok(())
}
