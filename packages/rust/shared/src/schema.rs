//! Declarative model-type schema table.
//!
//! Each [`ModelType`] owns an ordered field list. A field names where its
//! value comes from, an optional metadata key to fall back on, and the
//! default used when neither yields anything. Adding a model type means
//! adding a row here and a variant to [`ModelType`].

use crate::types::ModelType;

/// Where a field's value is taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Snippet heading as extracted.
    Heading,
    /// Snippet heading (or leading text when there is none) with brand
    /// suffixes removed.
    CleanHeading,
    /// Heading, or the first `n` characters of the text when there is none.
    HeadingOrText(usize),
    /// Text shortened to at most `n` characters on a word boundary.
    Summary(usize),
    ImageUrl,
    ImageAlt,
    /// Image alt text, or the heading when the image has none.
    ImageAltOrHeading,
    Link,
    /// The model type name itself.
    TypeName,
    /// Layout hint derived from whether an image was found.
    DisplayType,
    /// `<slug>_<type>_<ordinal>`.
    Uid,
    /// Never populated from the snippet; the default always applies.
    Unmapped,
}

/// One field of a model schema.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub source: FieldSource,
    /// Metadata key consulted when the source yields an empty value.
    pub meta_fallback: Option<&'static str>,
    pub default: &'static str,
}

impl FieldSpec {
    const fn new(name: &'static str, source: FieldSource) -> Self {
        Self {
            name,
            source,
            meta_fallback: None,
            default: "",
        }
    }

    const fn or_meta(mut self, key: &'static str) -> Self {
        self.meta_fallback = Some(key);
        self
    }
}

/// Ordered field list for one model type.
#[derive(Debug, Clone, Copy)]
pub struct ModelSchema {
    pub model_type: ModelType,
    pub fields: &'static [FieldSpec],
}

impl ModelSchema {
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> {
        self.fields.iter().map(|f| f.name)
    }
}

/// Maximum description length, in characters.
pub const SUMMARY_CHARS: usize = 160;

const BANNER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("Title", FieldSource::Heading).or_meta("og:title"),
    FieldSpec::new("url", FieldSource::ImageUrl).or_meta("og:image"),
    FieldSpec::new("alt", FieldSource::ImageAlt),
    FieldSpec::new("Headline", FieldSource::CleanHeading).or_meta("title"),
    FieldSpec::new("Byline", FieldSource::Unmapped),
    FieldSpec::new("Description", FieldSource::Summary(SUMMARY_CHARS)).or_meta("description"),
];

const HEADLINE_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("headline_text", FieldSource::CleanHeading),
    FieldSpec::new("color", FieldSource::Unmapped),
    FieldSpec::new("content_type_uid", FieldSource::TypeName),
];

const TEASER_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("title", FieldSource::HeadingOrText(60)),
    FieldSpec::new("description", FieldSource::Summary(SUMMARY_CHARS)),
    FieldSpec::new("image", FieldSource::ImageUrl),
    FieldSpec::new("alt_text", FieldSource::ImageAltOrHeading),
    FieldSpec::new("display_type", FieldSource::DisplayType),
    FieldSpec::new("uid", FieldSource::Uid),
];

/// The schema table, one row per model type.
pub const SCHEMAS: [ModelSchema; 3] = [
    ModelSchema {
        model_type: ModelType::Banner,
        fields: BANNER_FIELDS,
    },
    ModelSchema {
        model_type: ModelType::Headline,
        fields: HEADLINE_FIELDS,
    },
    ModelSchema {
        model_type: ModelType::Teaser,
        fields: TEASER_FIELDS,
    },
];

/// Look up the schema for a model type.
pub fn schema_for(model_type: ModelType) -> &'static ModelSchema {
    match model_type {
        ModelType::Banner => &SCHEMAS[0],
        ModelType::Headline => &SCHEMAS[1],
        ModelType::Teaser => &SCHEMAS[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_model_type_has_a_schema() {
        for t in ModelType::ALL {
            assert_eq!(schema_for(t).model_type, t);
            assert!(!schema_for(t).fields.is_empty());
        }
    }

    #[test]
    fn banner_schema_field_order() {
        let names: Vec<_> = schema_for(ModelType::Banner).field_names().collect();
        assert_eq!(
            names,
            ["Title", "url", "alt", "Headline", "Byline", "Description"]
        );
    }

    #[test]
    fn field_names_are_unique_per_schema() {
        for schema in &SCHEMAS {
            let mut names: Vec<_> = schema.field_names().collect();
            let before = names.len();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), before, "{} has duplicate fields", schema.model_type);
        }
    }
}
