//! Rule-based fuzzy inference
//!
//! Crisp inputs are fuzzified against each variable's sets, every rule
//! fires with `weight * min(antecedent degrees)`, rules sharing a
//! consequent are combined with `max`, and each output variable resolves
//! to a single category (winner-take-all) or a boolean flag.
//!
//! A rule base is immutable once built; [`RuleBase::decide`] is a pure
//! function of the rules and the inputs.

mod membership;

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;
use tracing::warn;

pub use membership::Membership;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FuzzyError {
    #[error("variable '{0}' is declared more than once")]
    DuplicateVariable(String),
    #[error("rule {rule} targets undeclared output variable '{output}'")]
    UnknownOutput { rule: usize, output: String },
    #[error("output '{output}' has no category '{category}'")]
    UnknownCategory { output: String, category: String },
    #[error("rule {rule} has weight {weight}, expected a value in [0, 1]")]
    InvalidWeight { rule: usize, weight: f64 },
    #[error("flag '{output}' has threshold {threshold}, expected a value in [0, 1]")]
    InvalidThreshold { output: String, threshold: f64 },
}

/// Crisp input snapshot, keyed by variable name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inputs(BTreeMap<String, f64>);

impl Inputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<'a> FromIterator<(&'a str, f64)> for Inputs {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        let mut inputs = Inputs::new();
        for (name, value) in iter {
            inputs.set(name, value);
        }
        inputs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzySet {
    pub name: String,
    pub membership: Membership,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyVariable {
    name: String,
    sets: Vec<FuzzySet>,
}

impl FuzzyVariable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sets: Vec::new(),
        }
    }

    pub fn with_set(mut self, name: &str, membership: Membership) -> Self {
        self.sets.push(FuzzySet {
            name: name.to_string(),
            membership,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sets(&self) -> &[FuzzySet] {
        &self.sets
    }

    fn has_set(&self, name: &str) -> bool {
        self.sets.iter().any(|set| set.name == name)
    }

    /// Membership degree of `value` in every set of this variable.
    pub fn fuzzify(&self, value: f64) -> HashMap<String, f64> {
        self.sets
            .iter()
            .map(|set| (set.name.clone(), set.membership.degree(value)))
            .collect()
    }
}

/// Membership degrees per (variable, set) for one input snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fuzzified(HashMap<String, HashMap<String, f64>>);

impl Fuzzified {
    pub fn degree(&self, variable: &str, set: &str) -> Option<f64> {
        self.0.get(variable)?.get(set).copied()
    }

    pub fn contains(&self, variable: &str) -> bool {
        self.0.contains_key(variable)
    }
}

/// `IF a IS x AND b IS y THEN output IS category`, scaled by `weight`.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyRule {
    antecedents: Vec<(String, String)>,
    output: String,
    category: String,
    weight: f64,
}

impl FuzzyRule {
    pub fn new(antecedents: &[(&str, &str)], consequent: (&str, &str), weight: f64) -> Self {
        Self {
            antecedents: antecedents
                .iter()
                .map(|(variable, set)| (variable.to_string(), set.to_string()))
                .collect(),
            output: consequent.0.to_string(),
            category: consequent.1.to_string(),
            weight,
        }
    }

    pub fn antecedents(&self) -> &[(String, String)] {
        &self.antecedents
    }

    pub fn consequent(&self) -> (&str, &str) {
        (&self.output, &self.category)
    }

    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// `weight * min(degrees)`; 0 when any antecedent has no degree in
    /// `fuzzified` or the rule has no antecedents at all.
    pub fn firing_strength(&self, fuzzified: &Fuzzified) -> f64 {
        let mut strength = f64::INFINITY;
        for (variable, set) in &self.antecedents {
            match fuzzified.degree(variable, set) {
                Some(degree) => strength = strength.min(degree),
                None => return 0.0,
            }
        }
        if strength.is_infinite() {
            return 0.0;
        }
        strength * self.weight
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutputKind {
    /// Winner-take-all over `priority`; earlier entries win ties. Falls back
    /// to `default` when nothing fires.
    Choice {
        priority: Vec<String>,
        default: String,
    },
    /// True when `yes` beats both `no` and `threshold`.
    Flag {
        yes: String,
        no: String,
        threshold: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputVariable {
    name: String,
    kind: OutputKind,
}

impl OutputVariable {
    pub fn choice(name: &str, priority: &[&str], default: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: OutputKind::Choice {
                priority: priority.iter().map(|c| c.to_string()).collect(),
                default: default.to_string(),
            },
        }
    }

    pub fn flag(name: &str, yes: &str, no: &str, threshold: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: OutputKind::Flag {
                yes: yes.to_string(),
                no: no.to_string(),
                threshold,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &OutputKind {
        &self.kind
    }

    fn has_category(&self, category: &str) -> bool {
        match &self.kind {
            OutputKind::Choice { priority, .. } => priority.iter().any(|c| c == category),
            OutputKind::Flag { yes, no, .. } => yes == category || no == category,
        }
    }
}

/// Aggregated strength per (output, category), max over rules
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregation(HashMap<(String, String), f64>);

impl Aggregation {
    pub fn strength(&self, output: &str, category: &str) -> f64 {
        self.0
            .get(&(output.to_string(), category.to_string()))
            .copied()
            .unwrap_or(0.0)
    }

    fn absorb(&mut self, output: &str, category: &str, strength: f64) {
        let slot = self
            .0
            .entry((output.to_string(), category.to_string()))
            .or_insert(0.0);
        *slot = slot.max(strength);
    }
}

/// Crisp result of one inference pass
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    choices: HashMap<String, String>,
    flags: HashMap<String, bool>,
    aggregation: Aggregation,
}

impl Decision {
    pub fn choice(&self, output: &str) -> Option<&str> {
        self.choices.get(output).map(String::as_str)
    }

    pub fn flag(&self, output: &str) -> bool {
        self.flags.get(output).copied().unwrap_or(false)
    }

    pub fn aggregation(&self) -> &Aggregation {
        &self.aggregation
    }
}

#[derive(Debug, Clone)]
pub struct RuleBase {
    inputs: Vec<FuzzyVariable>,
    outputs: Vec<OutputVariable>,
    rules: Vec<FuzzyRule>,
}

impl RuleBase {
    pub fn builder() -> RuleBaseBuilder {
        RuleBaseBuilder::default()
    }

    pub fn rules(&self) -> &[FuzzyRule] {
        &self.rules
    }

    /// Degrees for every declared variable present in `inputs`. Undeclared
    /// names are ignored; absent variables produce no entries.
    pub fn fuzzify(&self, inputs: &Inputs) -> Fuzzified {
        let mut fuzzified = HashMap::new();
        for variable in &self.inputs {
            if let Some(value) = inputs.get(variable.name()) {
                fuzzified.insert(variable.name().to_string(), variable.fuzzify(value));
            }
        }
        Fuzzified(fuzzified)
    }

    pub fn infer(&self, fuzzified: &Fuzzified) -> Aggregation {
        let mut aggregation = Aggregation::default();
        for rule in &self.rules {
            let strength = rule.firing_strength(fuzzified);
            if strength > 0.0 {
                aggregation.absorb(&rule.output, &rule.category, strength);
            }
        }
        aggregation
    }

    /// Winning category of a choice output, or `None` for unknown or
    /// non-choice outputs.
    pub fn select<'a>(&'a self, aggregation: &Aggregation, output: &str) -> Option<&'a str> {
        let variable = self.outputs.iter().find(|o| o.name == output)?;
        let OutputKind::Choice { priority, default } = &variable.kind else {
            return None;
        };
        let mut best: Option<(&str, f64)> = None;
        for category in priority {
            let strength = aggregation.strength(output, category);
            if strength <= 0.0 {
                continue;
            }
            match best {
                Some((_, top)) if strength <= top => {}
                _ => best = Some((category.as_str(), strength)),
            }
        }
        Some(best.map_or(default.as_str(), |(category, _)| category))
    }

    pub fn flag(&self, aggregation: &Aggregation, output: &str) -> bool {
        let Some(variable) = self.outputs.iter().find(|o| o.name == output) else {
            return false;
        };
        let OutputKind::Flag { yes, no, threshold } = &variable.kind else {
            return false;
        };
        let yes = aggregation.strength(output, yes);
        yes > aggregation.strength(output, no) && yes > *threshold
    }

    pub fn decide(&self, inputs: &Inputs) -> Decision {
        let aggregation = self.infer(&self.fuzzify(inputs));
        let mut choices = HashMap::new();
        let mut flags = HashMap::new();
        for output in &self.outputs {
            match output.kind {
                OutputKind::Choice { .. } => {
                    if let Some(category) = self.select(&aggregation, &output.name) {
                        choices.insert(output.name.clone(), category.to_string());
                    }
                }
                OutputKind::Flag { .. } => {
                    flags.insert(output.name.clone(), self.flag(&aggregation, &output.name));
                }
            }
        }
        Decision {
            choices,
            flags,
            aggregation,
        }
    }
}

#[derive(Debug, Default)]
pub struct RuleBaseBuilder {
    inputs: Vec<FuzzyVariable>,
    outputs: Vec<OutputVariable>,
    rules: Vec<FuzzyRule>,
}

impl RuleBaseBuilder {
    pub fn with_input(mut self, variable: FuzzyVariable) -> Self {
        self.inputs.push(variable);
        self
    }

    pub fn with_output(mut self, variable: OutputVariable) -> Self {
        self.outputs.push(variable);
        self
    }

    pub fn with_rule(mut self, rule: FuzzyRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_rules(mut self, rules: impl IntoIterator<Item = FuzzyRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn build(self) -> Result<RuleBase, FuzzyError> {
        let mut names: Vec<&str> = Vec::new();
        for name in self
            .inputs
            .iter()
            .map(FuzzyVariable::name)
            .chain(self.outputs.iter().map(OutputVariable::name))
        {
            if names.contains(&name) {
                return Err(FuzzyError::DuplicateVariable(name.to_string()));
            }
            names.push(name);
        }

        for output in &self.outputs {
            match &output.kind {
                OutputKind::Choice { default, .. } => {
                    if !output.has_category(default) {
                        return Err(FuzzyError::UnknownCategory {
                            output: output.name.clone(),
                            category: default.clone(),
                        });
                    }
                }
                OutputKind::Flag { threshold, .. } => {
                    if !(0.0..=1.0).contains(threshold) {
                        return Err(FuzzyError::InvalidThreshold {
                            output: output.name.clone(),
                            threshold: *threshold,
                        });
                    }
                }
            }
        }

        for (index, rule) in self.rules.iter().enumerate() {
            if !(0.0..=1.0).contains(&rule.weight) {
                return Err(FuzzyError::InvalidWeight {
                    rule: index,
                    weight: rule.weight,
                });
            }
            let output = self
                .outputs
                .iter()
                .find(|o| o.name == rule.output)
                .ok_or_else(|| FuzzyError::UnknownOutput {
                    rule: index,
                    output: rule.output.clone(),
                })?;
            if !output.has_category(&rule.category) {
                return Err(FuzzyError::UnknownCategory {
                    output: rule.output.clone(),
                    category: rule.category.clone(),
                });
            }
            for (variable, set) in &rule.antecedents {
                let known = self
                    .inputs
                    .iter()
                    .any(|input| input.name() == variable && input.has_set(set));
                if !known {
                    warn!(rule = index, %variable, %set, "rule antecedent can never fire");
                }
            }
        }

        Ok(RuleBase {
            inputs: self.inputs,
            outputs: self.outputs,
            rules: self.rules,
        })
    }
}
