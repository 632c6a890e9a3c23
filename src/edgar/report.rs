use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use strum::{EnumIter, IntoEnumIterator};

/// Filing form types with a known MD&A heading layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(try_from = "String", into = "String")]
pub enum FormType {
    Form10K,
    Form10Q,
    Form20F,
    Other(String),
}

impl TryFrom<String> for FormType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        FormType::from_str(&s)
    }
}

impl From<FormType> for String {
    fn from(form: FormType) -> Self {
        form.to_string()
    }
}

impl fmt::Display for FormType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormType::Form10K => write!(f, "10-K"),
            FormType::Form10Q => write!(f, "10-Q"),
            FormType::Form20F => write!(f, "20-F"),
            FormType::Other(s) => write!(f, "{}", s),
        }
    }
}

pub static FORM_TYPES: Lazy<String> = Lazy::new(|| {
    FormType::iter()
        .filter(|t| !matches!(t, FormType::Other(_)))
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(", ")
});

impl FormType {
    pub fn list_types() -> &'static str {
        &FORM_TYPES
    }
}

impl FromStr for FormType {
    type Err = String;

    /// Never fails: amendments (`10-K/A`) map to their base form and anything
    /// unrecognised becomes `Other`.
    fn from_str(s: &str) -> Result<FormType, String> {
        let trimmed = s.trim();
        let base = trimmed.split('/').next().unwrap_or(trimmed);
        let key: String = base
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-')
            .flat_map(char::to_uppercase)
            .collect();
        match key.as_str() {
            "10K" | "10K405" | "10KT" => Ok(FormType::Form10K),
            "10Q" | "10QT" => Ok(FormType::Form10Q),
            "20F" => Ok(FormType::Form20F),
            _ => Ok(FormType::Other(trimmed.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_forms() {
        assert_eq!("10-K".parse::<FormType>().unwrap(), FormType::Form10K);
        assert_eq!("10k".parse::<FormType>().unwrap(), FormType::Form10K);
        assert_eq!("10-K/A".parse::<FormType>().unwrap(), FormType::Form10K);
        assert_eq!(" 10-Q ".parse::<FormType>().unwrap(), FormType::Form10Q);
        assert_eq!("20-F".parse::<FormType>().unwrap(), FormType::Form20F);
    }

    #[test]
    fn test_unknown_form_is_other() {
        assert_eq!(
            "S-1".parse::<FormType>().unwrap(),
            FormType::Other("S-1".to_string())
        );
    }

    #[test]
    fn test_list_types() {
        assert_eq!(FormType::list_types(), "10-K, 10-Q, 20-F");
    }

    #[test]
    fn test_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&FormType::Form20F).unwrap(), r#""20-F""#);
        let form: FormType = serde_json::from_str(r#""10-Q""#).unwrap();
        assert_eq!(form, FormType::Form10Q);
    }
}
