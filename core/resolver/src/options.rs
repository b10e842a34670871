//! Switches that change how a policy is resolved.

use serde::Deserialize;

/// Resolver configuration.
///
/// Deserializes from kebab-case keys; absent keys default to `false`:
///
/// ```
/// use cil_resolver::options::ResolverOptions;
///
/// let options: ResolverOptions = serde_json::from_str(r#"{ "multiple-decls": true }"#).unwrap();
/// assert!(options.multiple_decls);
/// assert!(!options.qualified_names);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResolverOptions {
    /// Allow `type` and `typeattribute` to be declared more than once.
    pub multiple_decls: bool,
    /// Treat dotted names as plain keys instead of block paths.
    pub qualified_names: bool,
    /// Keep `tunableif` statements as `booleanif`s and tunables as booleans.
    pub preserve_tunables: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let options: ResolverOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ResolverOptions::default());
    }

    #[test]
    fn all_keys_are_kebab_case() {
        let options: ResolverOptions = serde_json::from_str(
            r#"{"multiple-decls": true, "qualified-names": true, "preserve-tunables": true}"#,
        )
        .unwrap();
        assert!(options.multiple_decls && options.qualified_names && options.preserve_tunables);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(serde_json::from_str::<ResolverOptions>(r#"{"mls": true}"#).is_err());
    }
}
