use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::FamilyError;

/// Kind of a family relation.
///
/// A stored edge `(from, to, kind)` reads "`to` is `from`'s `kind`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RelationType {
    Parent,
    Child,
    Sibling,
    Spouse,
    Grandparent,
    Grandchild,
    AuntUncle,
    NieceNephew,
    Cousin,
}

impl RelationType {
    pub const ALL: [RelationType; 9] = [
        RelationType::Parent,
        RelationType::Child,
        RelationType::Sibling,
        RelationType::Spouse,
        RelationType::Grandparent,
        RelationType::Grandchild,
        RelationType::AuntUncle,
        RelationType::NieceNephew,
        RelationType::Cousin,
    ];

    /// The relation seen from the other endpoint.
    pub fn inverse(self) -> Self {
        match self {
            Self::Parent => Self::Child,
            Self::Child => Self::Parent,
            Self::Sibling => Self::Sibling,
            Self::Spouse => Self::Spouse,
            Self::Grandparent => Self::Grandchild,
            Self::Grandchild => Self::Grandparent,
            Self::AuntUncle => Self::NieceNephew,
            Self::NieceNephew => Self::AuntUncle,
            Self::Cousin => Self::Cousin,
        }
    }

    pub fn is_symmetric(self) -> bool {
        self.inverse() == self
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parent => "parent",
            Self::Child => "child",
            Self::Sibling => "sibling",
            Self::Spouse => "spouse",
            Self::Grandparent => "grandparent",
            Self::Grandchild => "grandchild",
            Self::AuntUncle => "aunt_uncle",
            Self::NieceNephew => "niece_nephew",
            Self::Cousin => "cousin",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationType {
    type Err = FamilyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        let kind = match token.as_str() {
            "parent" => Self::Parent,
            "child" => Self::Child,
            "sibling" => Self::Sibling,
            "spouse" => Self::Spouse,
            "grandparent" => Self::Grandparent,
            "grandchild" => Self::Grandchild,
            "aunt_uncle" | "aunt/uncle" => Self::AuntUncle,
            "niece_nephew" | "niece/nephew" => Self::NieceNephew,
            "cousin" => Self::Cousin,
            _ => return Err(FamilyError::InvalidRelationType(s.to_string())),
        };
        Ok(kind)
    }
}

impl Serialize for RelationType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RelationType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_is_an_involution() {
        for kind in RelationType::ALL {
            assert_eq!(kind.inverse().inverse(), kind, "{kind}");
        }
    }

    #[test]
    fn symmetric_kinds() {
        let symmetric: Vec<_> = RelationType::ALL
            .into_iter()
            .filter(|k| k.is_symmetric())
            .collect();
        assert_eq!(
            symmetric,
            vec![RelationType::Sibling, RelationType::Spouse, RelationType::Cousin]
        );
    }

    #[test]
    fn parses_every_canonical_token() {
        for kind in RelationType::ALL {
            assert_eq!(kind.as_str().parse::<RelationType>().unwrap(), kind);
        }
    }

    #[test]
    fn parses_slash_spellings_and_case() {
        assert_eq!("aunt/uncle".parse::<RelationType>().unwrap(), RelationType::AuntUncle);
        assert_eq!(" Niece/Nephew ".parse::<RelationType>().unwrap(), RelationType::NieceNephew);
        assert_eq!("PARENT".parse::<RelationType>().unwrap(), RelationType::Parent);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "stepmother".parse::<RelationType>().unwrap_err();
        assert!(matches!(err, FamilyError::InvalidRelationType(ref t) if t == "stepmother"));
    }

    #[test]
    fn serde_uses_snake_case_tokens() {
        let json = serde_json::to_string(&RelationType::NieceNephew).unwrap();
        assert_eq!(json, "\"niece_nephew\"");

        let kind: RelationType = serde_json::from_str("\"aunt/uncle\"").unwrap();
        assert_eq!(kind, RelationType::AuntUncle);

        assert!(serde_json::from_str::<RelationType>("\"friend\"").is_err());
    }
}
