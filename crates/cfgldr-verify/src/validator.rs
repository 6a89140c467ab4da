// Configuration verification engine

use std::path::Path;

use cfgldr_section::{Origin, Provenance, Section, Value};
use tracing::{debug, trace};

use crate::error::{KeyPath, VerificationError, VerificationErrorKind, VerificationResult};
use crate::expr::Expression;
use crate::predicates::{PredicateError, PredicateRegistry};
use crate::schema::{CompiledSchema, Rule, RuleBody, RuleSet};
use crate::value::EvalValue;

/// Verifies a parsed configuration against a parsed schema.
///
/// `config_path` and `schema_path` name the documents in error messages.
/// Verification stops at the first failure.
pub fn verify(
    config: &Section,
    config_path: &Path,
    schema: &Section,
    schema_path: &Path,
    registry: &PredicateRegistry,
) -> VerificationResult<()> {
    CompiledSchema::compile(schema, schema_path)?.verify(config, config_path, registry)
}

impl CompiledSchema {
    /// Verify a parsed configuration against this schema.
    pub fn verify(
        &self,
        config: &Section,
        config_path: &Path,
        registry: &PredicateRegistry,
    ) -> VerificationResult<()> {
        let mut context = VerificationContext::new(registry);
        let provenance = Provenance::from(Origin::file(config_path));
        context.verify_section(config, &provenance, self.root())?;
        debug!(config = %config_path.display(), "verified");
        Ok(())
    }
}

/// Verification context tracks state during verification
struct VerificationContext<'a> {
    registry: &'a PredicateRegistry,
    /// Path of the configuration key being verified
    config_path: KeyPath,
}

impl<'a> VerificationContext<'a> {
    fn new(registry: &'a PredicateRegistry) -> Self {
        Self {
            registry,
            config_path: KeyPath::new(),
        }
    }

    /// Execute a function with a new configuration path segment
    fn with_key<F, R>(&mut self, key: &str, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.config_path.push(key);
        let result = f(self);
        self.config_path.pop();
        result
    }

    /// Match every key of `config` against `rules`, then check that every
    /// mandatory rule was matched. `provenance` belongs to the section itself.
    fn verify_section(
        &mut self,
        config: &Section,
        provenance: &Provenance,
        rules: &RuleSet,
    ) -> VerificationResult<()> {
        // value rules see the section they are checked in
        let cnf = EvalValue::Map(config.to_plain_mapping());
        let mut matched = vec![false; rules.len()];

        for (key, entry) in config.entries() {
            let key_provenance = &entry.attrs.provenance;
            let Some((index, rule)) = rules.find(key, &entry.value) else {
                return Err(VerificationError::new(VerificationErrorKind::NoRuleFound)
                    .with_config(self.config_path.join(key.as_str()), key_provenance)
                    .with_rule(rules.path().clone(), rules.provenance()));
            };
            matched[index] = true;

            self.with_key(key, |ctx| match (&entry.value, rule.body()) {
                (Value::Section(sub), RuleBody::Section(sub_rules)) => {
                    ctx.verify_section(sub, key_provenance, sub_rules)
                }
                (Value::Text(text), RuleBody::Value(expr)) => {
                    ctx.verify_value(text, &cnf, expr, rule, key_provenance)
                }
                (Value::Template(template), RuleBody::Value(expr)) => {
                    ctx.verify_value(&template.to_string(), &cnf, expr, rule, key_provenance)
                }
                // rules only match entries of their own shape
                _ => Ok(()),
            })?;
            debug!(key = %key, rule = %rule.path(), "matched");
        }

        if let Some(rule) = rules
            .rules()
            .iter()
            .zip(&matched)
            .find_map(|(rule, &found)| (rule.is_mandatory() && !found).then_some(rule))
        {
            return Err(VerificationError::new(VerificationErrorKind::MissingMandatoryKey)
                .with_config(self.config_path.clone(), provenance)
                .with_rule(rule.path().clone(), rule.provenance()));
        }
        Ok(())
    }

    fn verify_value(
        &self,
        text: &str,
        cnf: &EvalValue,
        expr: &Expression,
        rule: &Rule,
        provenance: &Provenance,
    ) -> VerificationResult<()> {
        trace!(key = %self.config_path, rule = %expr, "evaluating");
        let kind = match expr.evaluate(&EvalValue::from(text), cnf, self.registry) {
            Ok(result) if result.is_truthy() => return Ok(()),
            Ok(_) => VerificationErrorKind::RuleFailed,
            Err(PredicateError::Failed(message)) => {
                VerificationErrorKind::PredicateFailed { message }
            }
            Err(PredicateError::Invalid(message)) => {
                VerificationErrorKind::PredicateError { message }
            }
        };
        Err(VerificationError::new(kind)
            .with_config(self.config_path.clone(), provenance)
            .with_rule(rule.path().clone(), rule.provenance()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(entries: &[(&str, &str)]) -> Section {
        let mut s = Section::root();
        for (k, v) in entries {
            s.set(*k, *v).unwrap();
        }
        s
    }

    fn check(config: &Section, schema: &Section) -> VerificationResult<()> {
        verify(
            config,
            Path::new("app.conf"),
            schema,
            Path::new("schema.conf"),
            &PredicateRegistry::new(),
        )
    }

    fn kind(config: &Section, schema: &Section) -> VerificationErrorKind {
        check(config, schema).unwrap_err().kind
    }

    #[test]
    fn test_value_rules() {
        let schema = section(&[("port", "re('[0-9]+')")]);
        assert!(check(&section(&[("port", "42")]), &schema).is_ok());
        assert_eq!(
            kind(&section(&[("port", "x")]), &schema),
            VerificationErrorKind::RuleFailed
        );
    }

    #[test]
    fn test_no_rule_found() {
        let schema = section(&[("port", "True")]);
        let err = check(&section(&[("host", "h")]), &schema).unwrap_err();
        assert_eq!(err.kind, VerificationErrorKind::NoRuleFound);
        assert_eq!(err.config_key.to_string(), "host");
        assert_eq!(err.rule_key.to_string(), "(root)");
    }

    #[test]
    fn test_missing_mandatory_key() {
        let mut schema = section(&[("optional", "True")]);
        schema.set("required", "True").unwrap().mandatory = true;

        let err = check(&section(&[("optional", "x")]), &schema).unwrap_err();
        assert_eq!(err.kind, VerificationErrorKind::MissingMandatoryKey);
        assert_eq!(err.config_key.to_string(), "(root)");
        assert_eq!(err.rule_key.to_string(), "required");

        assert!(check(&section(&[("required", "x")]), &schema).is_ok());
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // the broader rule comes first, so the stricter one is never consulted
        let schema = section(&[("p.*", "True"), ("port", "re('[0-9]+')")]);
        assert!(check(&section(&[("port", "x")]), &schema).is_ok());

        let schema = section(&[("port", "re('[0-9]+')"), ("p.*", "True")]);
        assert_eq!(
            kind(&section(&[("port", "x")]), &schema),
            VerificationErrorKind::RuleFailed
        );
    }

    #[test]
    fn test_shape_mismatch_skips_rule() {
        let mut rules = Section::named("db");
        rules.set("host", "True").unwrap();
        let mut schema = Section::root();
        schema.set("db", "fail('db must be a section')").unwrap();
        schema.set("d.*", rules).unwrap();

        let mut db = Section::named("db");
        db.set("host", "h").unwrap();
        let mut config = Section::root();
        config.set("db", db).unwrap();
        assert!(check(&config, &schema).is_ok());

        let config = section(&[("db", "flat")]);
        assert_eq!(
            kind(&config, &schema),
            VerificationErrorKind::PredicateFailed {
                message: "db must be a section".to_string()
            }
        );
    }

    #[test]
    fn test_nested_sections_report_full_paths() {
        let mut tls_rules = Section::named("tls");
        tls_rules.set("cert", "re('.*[.]pem')").unwrap();
        let mut server_rules = Section::named("server");
        server_rules.set("tls", tls_rules).unwrap();
        let mut schema = Section::root();
        schema.set("server", server_rules).unwrap();

        let mut tls = Section::named("tls");
        tls.set("cert", "cert.der").unwrap();
        let mut server = Section::named("server");
        server.set("tls", tls).unwrap();
        let mut config = Section::root();
        config.set("server", server).unwrap();

        let err = check(&config, &schema).unwrap_err();
        assert_eq!(err.kind, VerificationErrorKind::RuleFailed);
        assert_eq!(err.config_key.to_string(), "server:tls:cert");
        assert_eq!(err.rule_key.to_string(), "server:tls:cert");
    }

    #[test]
    fn test_cnf_is_the_enclosing_section() {
        let schema = section(&[
            ("mode", "re('strict|lenient')"),
            ("retries", "cond(CNF['mode'] == 'lenient' or VAL == '0', 'strict mode allows no retries')"),
        ]);
        assert!(check(&section(&[("mode", "lenient"), ("retries", "3")]), &schema).is_ok());
        assert!(check(&section(&[("mode", "strict"), ("retries", "0")]), &schema).is_ok());
        assert_eq!(
            kind(&section(&[("mode", "strict"), ("retries", "3")]), &schema),
            VerificationErrorKind::PredicateFailed {
                message: "strict mode allows no retries".to_string()
            }
        );
    }

    #[test]
    fn test_predicate_errors() {
        let schema = section(&[("a", "unknown(VAL)")]);
        assert_eq!(
            kind(&section(&[("a", "x")]), &schema),
            VerificationErrorKind::PredicateError {
                message: "name 'unknown' is not defined".to_string()
            }
        );
    }

    #[test]
    fn test_custom_predicate() {
        let registry = PredicateRegistry::new().with("port", |val, _| {
            let ok = val
                .as_str()
                .and_then(|s| s.parse::<u16>().ok())
                .is_some_and(|p| p > 0);
            Ok(EvalValue::Bool(ok))
        });
        let schema = section(&[("listen", "port()")]);
        let config_path = Path::new("app.conf");
        let schema_path = Path::new("schema.conf");

        let ok = section(&[("listen", "8080")]);
        assert!(verify(&ok, config_path, &schema, schema_path, &registry).is_ok());
        let bad = section(&[("listen", "70000")]);
        assert!(verify(&bad, config_path, &schema, schema_path, &registry).is_err());
    }

    #[test]
    fn test_empty_schema_rejects_any_key() {
        let schema = Section::root();
        assert!(check(&Section::root(), &schema).is_ok());
        assert_eq!(
            kind(&section(&[("a", "1")]), &schema),
            VerificationErrorKind::NoRuleFound
        );
    }
}
