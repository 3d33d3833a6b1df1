//! Node-type catalogue: containment policy and field schemas.
//!
//! The document never hard-codes which node types may hold which children.
//! It asks a [`Catalogue`] at attach time, and consults the catalogue's
//! [`FieldSchema`] when nodes are created or fields are written.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::node::TypeTag;
use crate::domain::value::FieldValue;

/// Field names and default values for one node type.
pub type FieldSchema = BTreeMap<String, FieldValue>;

/// Supplies containment rules and field schemas for node types.
pub trait Catalogue: Send + Sync {
    /// May a node of type `parent` hold a child of type `child`?
    fn accepts(&self, parent: &TypeTag, child: &TypeTag) -> bool;

    /// Is `tag` a valid node type?
    fn knows(&self, _tag: &TypeTag) -> bool {
        true
    }

    /// Field schema of `tag`, if the catalogue restricts its fields.
    fn schema(&self, _tag: &TypeTag) -> Option<&FieldSchema> {
        None
    }
}

/// Adapter turning a plain predicate into a [`Catalogue`] without schemas.
pub struct FnPolicy<F>(pub F);

impl<F> Catalogue for FnPolicy<F>
where
    F: Fn(&TypeTag, &TypeTag) -> bool + Send + Sync,
{
    fn accepts(&self, parent: &TypeTag, child: &TypeTag) -> bool {
        (self.0)(parent, child)
    }
}

impl<F> fmt::Debug for FnPolicy<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnPolicy")
    }
}

/// Which children a node type accepts.
///
/// Written in TOML as `"any"`, `"none"` or a list of type tags.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "AcceptsRepr", into = "AcceptsRepr")]
pub enum Accepts {
    #[default]
    Any,
    Nothing,
    Only(BTreeSet<TypeTag>),
}

impl Accepts {
    pub fn only<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TypeTag>,
    {
        Accepts::Only(tags.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, child: &TypeTag) -> bool {
        match self {
            Accepts::Any => true,
            Accepts::Nothing => false,
            Accepts::Only(tags) => tags.contains(child),
        }
    }
}

impl fmt::Display for Accepts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accepts::Any => f.write_str("any"),
            Accepts::Nothing => f.write_str("none"),
            Accepts::Only(tags) => write!(f, "{}", itertools::join(tags, ", ")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum AcceptsRepr {
    Keyword(String),
    Only(Vec<TypeTag>),
}

impl TryFrom<AcceptsRepr> for Accepts {
    type Error = String;

    fn try_from(repr: AcceptsRepr) -> Result<Self, Self::Error> {
        match repr {
            AcceptsRepr::Keyword(word) => match word.as_str() {
                "any" => Ok(Accepts::Any),
                "none" => Ok(Accepts::Nothing),
                other => Err(format!(
                    "invalid accepts value '{}': expected \"any\", \"none\" or a list",
                    other
                )),
            },
            AcceptsRepr::Only(tags) => Ok(Accepts::Only(tags.into_iter().collect())),
        }
    }
}

impl From<Accepts> for AcceptsRepr {
    fn from(accepts: Accepts) -> Self {
        match accepts {
            Accepts::Any => AcceptsRepr::Keyword("any".into()),
            Accepts::Nothing => AcceptsRepr::Keyword("none".into()),
            Accepts::Only(tags) => AcceptsRepr::Only(tags.into_iter().collect()),
        }
    }
}

/// Catalogue entry for one node type.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeSpec {
    pub accepts: Accepts,
    /// When present, only these fields may be written; values are defaults
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldSchema>,
}

impl TypeSpec {
    pub fn accepting(accepts: Accepts) -> Self {
        Self {
            accepts,
            fields: None,
        }
    }

    pub fn with_fields(mut self, fields: FieldSchema) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Data-driven catalogue, loadable from configuration.
///
/// Types missing from `types` accept any child and have no schema. With
/// `strict` set they are rejected as unknown instead.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeCatalogue {
    pub strict: bool,
    pub types: BTreeMap<TypeTag, TypeSpec>,
}

impl TypeCatalogue {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builder's stock rules: text is a leaf, lists hold list items,
    /// list items hold text or images.
    pub fn reference() -> Self {
        Self::new()
            .with_type("text", TypeSpec::accepting(Accepts::Nothing))
            .with_type("list", TypeSpec::accepting(Accepts::only(["list-item"])))
            .with_type(
                "list-item",
                TypeSpec::accepting(Accepts::only(["text", "image"])),
            )
    }

    pub fn with_type(mut self, tag: impl Into<TypeTag>, spec: TypeSpec) -> Self {
        self.types.insert(tag.into(), spec);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn get(&self, tag: &TypeTag) -> Option<&TypeSpec> {
        self.types.get(tag)
    }

    /// Overlay another catalogue: its type entries replace ours, its
    /// strictness wins.
    pub fn merge(&self, overlay: &TypeCatalogue) -> Self {
        let mut types = self.types.clone();
        for (tag, spec) in &overlay.types {
            types.insert(tag.clone(), spec.clone());
        }
        Self {
            strict: overlay.strict,
            types,
        }
    }
}

impl Catalogue for TypeCatalogue {
    fn accepts(&self, parent: &TypeTag, child: &TypeTag) -> bool {
        if self.strict && !self.types.contains_key(child) {
            return false;
        }
        self.types
            .get(parent)
            .map(|spec| spec.accepts.allows(child))
            .unwrap_or(!self.strict)
    }

    fn knows(&self, tag: &TypeTag) -> bool {
        !self.strict || self.types.contains_key(tag)
    }

    fn schema(&self, tag: &TypeTag) -> Option<&FieldSchema> {
        self.types.get(tag).and_then(|spec| spec.fields.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("text", "text", false)]
    #[case("text", "image", false)]
    #[case("list", "list-item", true)]
    #[case("list", "text", false)]
    #[case("list-item", "text", true)]
    #[case("list-item", "image", true)]
    #[case("list-item", "list", false)]
    #[case("fragment", "list", true)]
    #[case("fragment", "anything", true)]
    fn given_reference_catalogue_when_checking_pair_then_matches_rules(
        #[case] parent: &str,
        #[case] child: &str,
        #[case] expected: bool,
    ) {
        let catalogue = TypeCatalogue::reference();
        assert_eq!(catalogue.accepts(&parent.into(), &child.into()), expected);
    }

    #[test]
    fn given_strict_catalogue_when_type_unknown_then_rejected() {
        let catalogue = TypeCatalogue::reference()
            .with_type("fragment", TypeSpec::default())
            .strict(true);
        assert!(!catalogue.knows(&"button".into()));
        assert!(catalogue.knows(&"list".into()));
        assert!(!catalogue.accepts(&"fragment".into(), &"button".into()));
        assert!(catalogue.accepts(&"fragment".into(), &"list".into()));
    }

    #[test]
    fn given_overlay_when_merging_then_entries_replace_per_type() {
        let overlay = TypeCatalogue::new().with_type("text", TypeSpec::accepting(Accepts::Any));
        let merged = TypeCatalogue::reference().merge(&overlay);
        assert!(merged.accepts(&"text".into(), &"image".into()));
        assert!(!merged.accepts(&"list".into(), &"text".into()));
    }

    #[test]
    fn given_closure_when_wrapped_then_acts_as_catalogue() {
        let policy = FnPolicy(|parent: &TypeTag, _child: &TypeTag| parent != "leaf");
        assert!(policy.accepts(&"box".into(), &"leaf".into()));
        assert!(!policy.accepts(&"leaf".into(), &"box".into()));
        assert!(policy.schema(&"box".into()).is_none());
    }

    #[test]
    fn given_toml_catalogue_when_deserializing_then_accepts_keywords_and_lists() {
        let src = r#"
strict = false

[types.text]
accepts = "none"

[types.text.fields]
text = ""

[types.list]
accepts = ["list-item"]
"#;
        let catalogue: TypeCatalogue = toml::from_str(src).unwrap();
        assert_eq!(catalogue.get(&"text".into()).unwrap().accepts, Accepts::Nothing);
        assert!(catalogue.schema(&"text".into()).unwrap().contains_key("text"));
        assert!(catalogue.accepts(&"list".into(), &"list-item".into()));
    }

    #[test]
    fn given_bad_keyword_when_deserializing_then_fails() {
        let result: Result<TypeCatalogue, _> = toml::from_str("[types.x]\naccepts = \"some\"");
        assert!(result.is_err());
    }
}
