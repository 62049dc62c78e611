/*! The Brazilian federative units (UF) an analysis run can be scoped to. */

use crate::records::Field;
use std::str::FromStr;
use strum::{Display, EnumIter, EnumString};

/** The 27 two-letter state abbreviations. */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Uf {
    AC,
    AL,
    AP,
    AM,
    BA,
    CE,
    DF,
    ES,
    GO,
    MA,
    MT,
    MS,
    MG,
    PA,
    PB,
    PR,
    PE,
    PI,
    RJ,
    RN,
    RS,
    RO,
    RR,
    SC,
    SP,
    SE,
    TO,
}

impl Uf {
    /// Whether a raw UF cell refers to this state. Comparison is trimmed and case-insensitive.
    pub fn matches_field(&self, field: &Field) -> bool {
        match field {
            Field::Text(s) => Uf::from_str(s.trim()).map(|u| u == *self).unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_all_27_states() {
        assert_eq!(Uf::iter().count(), 27);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(Uf::from_str("se").unwrap(), Uf::SE);
        assert_eq!(Uf::from_str("SP").unwrap(), Uf::SP);
        assert!(Uf::from_str("XX").is_err());
    }

    #[test]
    fn test_matches_field() {
        assert!(Uf::SE.matches_field(&Field::Text(" SE ".to_owned())));
        assert!(Uf::SE.matches_field(&Field::Text("se".to_owned())));
        assert!(!Uf::SE.matches_field(&Field::Text("BA".to_owned())));
        assert!(!Uf::SE.matches_field(&Field::Absent));
        assert!(!Uf::SE.matches_field(&Field::Number(28.0)));
    }
}
