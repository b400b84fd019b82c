// src/soap.rs
//! Request envelopes for SOAP sources, looked up by action key.

use std::collections::HashMap;

pub const LIST_OF_CONTINENTS_BY_NAME: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<soap12:Envelope xmlns:soap12="http://www.w3.org/2003/05/soap-envelope">
  <soap12:Body>
    <ListOfContinentsByName xmlns="http://www.oorsprong.org/websamples.countryinfo">
    </ListOfContinentsByName>
  </soap12:Body>
</soap12:Envelope>
"#;

#[derive(Debug, Clone)]
pub struct SoapTemplates {
    bodies: HashMap<String, String>,
}

impl Default for SoapTemplates {
    fn default() -> Self {
        let mut bodies = HashMap::new();
        bodies.insert(
            "ListOfContinentsByName".to_string(),
            LIST_OF_CONTINENTS_BY_NAME.to_string(),
        );
        Self { bodies }
    }
}

impl SoapTemplates {
    /// Built-ins plus `overrides`; an override replaces a built-in with the same key.
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut t = Self::default();
        for (k, v) in overrides {
            t.bodies.insert(k.clone(), v.clone());
        }
        t
    }

    pub fn get(&self, action: &str) -> Option<&str> {
        self.bodies.get(action).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_action_is_registered() {
        let t = SoapTemplates::default();
        let body = t.get("ListOfContinentsByName").unwrap();
        assert!(body.contains("<ListOfContinentsByName"));
        assert!(t.get("Nope").is_none());
    }

    #[test]
    fn overrides_extend_and_replace() {
        let mut o = HashMap::new();
        o.insert("ListOfContinentsByName".to_string(), "<x/>".to_string());
        o.insert("CapitalCity".to_string(), "<y/>".to_string());
        let t = SoapTemplates::with_overrides(&o);
        assert_eq!(t.get("ListOfContinentsByName"), Some("<x/>"));
        assert_eq!(t.get("CapitalCity"), Some("<y/>"));
        assert_eq!(t.len(), 2);
    }
}
