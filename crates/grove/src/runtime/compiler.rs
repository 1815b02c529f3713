use crate::error::GrammarError;
use crate::grammar::{ChoiceKind, Grammar, ItemId, RuleItem, RuleRef, Terminal};
use crate::runtime::{RuleId, RuntimeRule, RuntimeRuleKind, RuntimeRuleSet, Sequence, TerminalMatcher};
use hashbrown::HashMap;
use lasso::{Rodeo, Spur};

/// Compile `grammar` and everything it inherits into a [`RuntimeRuleSet`]
pub(crate) fn compile(grammar: &Grammar) -> Result<RuntimeRuleSet, GrammarError> {
    RuleSetCompiler::new(grammar).compile()
}

/// Counters for naming the pseudo rules lifted out of one declared rule
struct PseudoNames<'g> {
    owner: &'g str,
    groups: usize,
    multis: usize,
    lists: usize,
}

impl<'g> PseudoNames<'g> {
    const fn new(owner: &'g str) -> Self {
        Self {
            owner,
            groups: 0,
            multis: 0,
            lists: 0,
        }
    }

    fn next(&mut self, item: &RuleItem) -> String {
        let (label, counter) = match item {
            RuleItem::Multi { .. } => ("multi", &mut self.multis),
            RuleItem::SeparatedList { .. } => ("sList", &mut self.lists),
            _ => ("group", &mut self.groups),
        };
        let name = format!("§{}§{label}{counter}", self.owner);
        *counter += 1;
        name
    }
}

struct RuleSetCompiler<'g> {
    grammar: &'g Grammar,
    rules: Vec<RuntimeRule>,
    interner: Rodeo,
    by_name: HashMap<Spur, RuleId, ahash::RandomState>,
    terminals: HashMap<Terminal, RuleId, ahash::RandomState>,
}

impl<'g> RuleSetCompiler<'g> {
    fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            rules: Vec::new(),
            interner: Rodeo::default(),
            by_name: HashMap::default(),
            terminals: HashMap::default(),
        }
    }

    fn compile(mut self) -> Result<RuntimeRuleSet, GrammarError> {
        let grammar = self.grammar;
        let empty = self.terminal("<EMPTY>", &Terminal::empty())?;

        let visible = grammar.all_rules();
        let mut declared = Vec::with_capacity(visible.len());
        for rule in &visible {
            let id = self.alloc(rule.name(), rule.rule().is_skip(), false);
            let tag = self.rules[id.index()].tag;
            self.by_name.insert(tag, id);
            declared.push((id, *rule));
        }

        for (id, rule) in &declared {
            let mut names = PseudoNames::new(rule.name());
            let kind = self.compile_choice(rule.rhs().id(), rule.grammar(), &mut names)?;
            self.rules[id.index()].kind = kind;
        }

        let skip_rules: Vec<RuleId> = declared
            .iter()
            .filter(|(_, rule)| rule.rule().is_skip())
            .map(|(id, _)| *id)
            .collect();

        let grammar = grammar.qualified_name();
        log::debug!(
            "compiled {grammar}: {} runtime rules ({} declared, {} terminals, {} skip)",
            self.rules.len(),
            declared.len(),
            self.terminals.len(),
            skip_rules.len()
        );

        Ok(RuntimeRuleSet {
            grammar,
            rules: self.rules,
            names: self.interner.into_reader(),
            by_name: self.by_name,
            skip_rules,
            empty,
        })
    }

    fn alloc(&mut self, name: &str, is_skip: bool, is_pseudo: bool) -> RuleId {
        let id = RuleId::new(self.rules.len());
        let tag = self.interner.get_or_intern(name);
        self.rules.push(RuntimeRule {
            id,
            tag,
            kind: RuntimeRuleKind::Concatenation(Sequence::new()),
            is_skip,
            is_pseudo,
        });
        id
    }

    fn terminal(&mut self, owner: &str, terminal: &Terminal) -> Result<RuleId, GrammarError> {
        if let Some(id) = self.terminals.get(terminal) {
            return Ok(*id);
        }
        let matcher = TerminalMatcher::compile(owner, terminal)?;
        let id = self.alloc(&matcher.describe(), false, false);
        self.rules[id.index()].kind = RuntimeRuleKind::Terminal(matcher);
        self.terminals.insert(terminal.clone(), id);
        Ok(id)
    }

    /// A right-hand side or group body; single alternatives collapse to a
    /// concatenation, and a lone repetition to the repetition itself
    fn compile_choice(
        &mut self,
        choice: ItemId,
        owner: &'g Grammar,
        names: &mut PseudoNames<'g>,
    ) -> Result<RuntimeRuleKind, GrammarError> {
        let (kind, alternatives) = match owner.item(choice).item() {
            RuleItem::Choice { kind, alternatives } => (*kind, alternatives.as_slice()),
            _ => (ChoiceKind::Simple, std::slice::from_ref(&choice)),
        };

        if let [single] = alternatives {
            if let RuleItem::Concatenation { items } = owner.item(*single).item() {
                if let [only] = items.as_slice() {
                    let item = owner.item(*only).item();
                    if matches!(item, RuleItem::Multi { .. } | RuleItem::SeparatedList { .. }) {
                        return self.compile_repetition(*only, owner, names);
                    }
                }
            }
            return Ok(RuntimeRuleKind::Concatenation(
                self.compile_sequence(*single, owner, names)?,
            ));
        }

        let alternatives = alternatives
            .iter()
            .map(|alternative| self.compile_sequence(*alternative, owner, names))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RuntimeRuleKind::Choice { kind, alternatives })
    }

    fn compile_sequence(
        &mut self,
        concatenation: ItemId,
        owner: &'g Grammar,
        names: &mut PseudoNames<'g>,
    ) -> Result<Sequence, GrammarError> {
        match owner.item(concatenation).item() {
            RuleItem::Concatenation { items } => items
                .iter()
                .map(|item| self.compile_item(*item, owner, names))
                .collect(),
            _ => Ok(std::iter::once(self.compile_item(concatenation, owner, names)?).collect()),
        }
    }

    fn compile_repetition(
        &mut self,
        repetition: ItemId,
        owner: &'g Grammar,
        names: &mut PseudoNames<'g>,
    ) -> Result<RuntimeRuleKind, GrammarError> {
        match owner.item(repetition).item() {
            RuleItem::Multi { min, max, item } => Ok(RuntimeRuleKind::Multi {
                min: *min,
                max: *max,
                item: self.compile_item(*item, owner, names)?,
            }),
            RuleItem::SeparatedList {
                min,
                max,
                item,
                separator,
            } => Ok(RuntimeRuleKind::SeparatedList {
                min: *min,
                max: *max,
                item: self.compile_item(*item, owner, names)?,
                separator: self.compile_item(*separator, owner, names)?,
            }),
            _ => Ok(RuntimeRuleKind::Concatenation(
                std::iter::once(self.compile_item(repetition, owner, names)?).collect(),
            )),
        }
    }

    fn compile_item(
        &mut self,
        id: ItemId,
        owner: &'g Grammar,
        names: &mut PseudoNames<'g>,
    ) -> Result<RuleId, GrammarError> {
        let item = owner.item(id).item();
        match item {
            RuleItem::Terminal(terminal) => self.terminal(names.owner, terminal),
            RuleItem::NonTerminal { name } => self.resolve(name),
            RuleItem::Group { choice } => {
                let pseudo = self.alloc(&names.next(item), false, true);
                let kind = self.compile_choice(*choice, owner, names)?;
                self.rules[pseudo.index()].kind = kind;
                Ok(pseudo)
            }
            RuleItem::Multi { .. } | RuleItem::SeparatedList { .. } => {
                let pseudo = self.alloc(&names.next(item), false, true);
                let kind = self.compile_repetition(id, owner, names)?;
                self.rules[pseudo.index()].kind = kind;
                Ok(pseudo)
            }
            RuleItem::Choice { .. } => {
                let pseudo = self.alloc(&names.next(item), false, true);
                let kind = self.compile_choice(id, owner, names)?;
                self.rules[pseudo.index()].kind = kind;
                Ok(pseudo)
            }
            RuleItem::Concatenation { .. } => {
                let pseudo = self.alloc(&names.next(item), false, true);
                let sequence = self.compile_sequence(id, owner, names)?;
                self.rules[pseudo.index()].kind = RuntimeRuleKind::Concatenation(sequence);
                Ok(pseudo)
            }
        }
    }

    /// Resolve through the grammar being compiled, so that a derived grammar's
    /// override also applies to references made from inherited rules
    fn resolve(&self, name: &str) -> Result<RuleId, GrammarError> {
        let rule: RuleRef<'_> = self.grammar.find_all_rule(name)?;
        self.interner
            .get(rule.name())
            .and_then(|tag| self.by_name.get(&tag).copied())
            .ok_or_else(|| GrammarError::rule_not_found(name, &self.grammar.qualified_name(), 0))
    }
}
