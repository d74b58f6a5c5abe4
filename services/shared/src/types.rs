//! Type-safe wrappers for domain primitives
//!
//! A `Bet` is validated once when parsed from an input line and is immutable
//! afterwards. Its wire form is produced by `Bet::encode`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::errors::BetParseError;

/// Numeric identifier of the agency a client reports for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgencyId(u32);

impl AgencyId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn get(&self) -> u32 {
        self.0
    }
}

impl FromStr for AgencyId {
    type Err = BetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_integer("agency", s).map(Self)
    }
}

impl fmt::Display for AgencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single bet read from the agency data file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    pub agency: AgencyId,
    pub name: String,
    pub surname: String,
    pub document: u64,
    pub birthdate: String,
    pub number: u64,
}

impl Bet {
    /// Parse one CSV line.
    ///
    /// Accepts `name,surname,document,birthdate,number` (the agency comes from
    /// `agency`) or the same columns prefixed by an agency id.
    pub fn from_csv_line(line: &str, agency: AgencyId) -> Result<Self, BetParseError> {
        let fields: Vec<&str> = line
            .trim_end_matches('\r')
            .split(CSV_SEPARATOR)
            .map(str::trim)
            .collect();

        match fields.len() {
            CSV_FIELDS => Self::from_fields(agency, &fields),
            CSV_FIELDS_WITH_AGENCY => {
                let agency = fields[0].parse()?;
                Self::from_fields(agency, &fields[1..])
            }
            found => Err(BetParseError::FieldCount { found }),
        }
    }

    /// Decode the wire form produced by [`Bet::encode`]
    pub fn decode(encoded: &str) -> Result<Self, BetParseError> {
        let fields: Vec<&str> = encoded.split(BET_FIELD_SEPARATOR).collect();

        if fields.len() != CSV_FIELDS_WITH_AGENCY {
            return Err(BetParseError::FieldCount { found: fields.len() });
        }

        let agency = fields[0].parse()?;
        Self::from_fields(agency, &fields[1..])
    }

    /// `agency+name+surname+document+birthdate+number`
    pub fn encode(&self) -> String {
        format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}{}{sep}{}",
            self.agency,
            self.name,
            self.surname,
            self.document,
            self.birthdate,
            self.number,
            sep = BET_FIELD_SEPARATOR,
        )
    }

    fn from_fields(agency: AgencyId, fields: &[&str]) -> Result<Self, BetParseError> {
        let name = text_field("name", fields[0])?;
        let surname = text_field("surname", fields[1])?;
        let document = parse_integer("document", fields[2])?;
        let birthdate = text_field("birthdate", fields[3])?;
        let number = parse_integer("number", fields[4])?;

        Ok(Self {
            agency,
            name,
            surname,
            document,
            birthdate,
            number,
        })
    }
}

fn text_field(field: &'static str, value: &str) -> Result<String, BetParseError> {
    if value.is_empty() {
        return Err(BetParseError::EmptyField { field });
    }

    // These would corrupt the batch framing
    if value.contains(|c: char| {
        c == BATCH_SEPARATOR || c == BET_FIELD_SEPARATOR || c == MESSAGE_DELIMITER
    }) {
        return Err(BetParseError::ReservedCharacter { field });
    }

    Ok(value.to_string())
}

fn parse_integer<T: FromStr>(field: &'static str, value: &str) -> Result<T, BetParseError> {
    if value.is_empty() {
        return Err(BetParseError::EmptyField { field });
    }

    value.parse().map_err(|_| BetParseError::NotAnInteger {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agency() -> AgencyId {
        AgencyId::new(1)
    }

    #[test]
    fn test_parse_five_field_line() {
        let bet = Bet::from_csv_line("Santiago,Lorca,30904465,1999-03-17,7574", agency())
            .unwrap();

        assert_eq!(bet.agency, agency());
        assert_eq!(bet.name, "Santiago");
        assert_eq!(bet.surname, "Lorca");
        assert_eq!(bet.document, 30904465);
        assert_eq!(bet.birthdate, "1999-03-17");
        assert_eq!(bet.number, 7574);
    }

    #[test]
    fn test_parse_six_field_line_uses_embedded_agency() {
        let bet = Bet::from_csv_line("4,Ana,Gomez,123,2000-01-01,42", agency()).unwrap();
        assert_eq!(bet.agency, AgencyId::new(4));
        assert_eq!(bet.number, 42);
    }

    #[test]
    fn test_parse_trims_carriage_return_and_spaces() {
        let bet = Bet::from_csv_line(" Ana , Gomez ,123,2000-01-01,42\r", agency()).unwrap();
        assert_eq!(bet.name, "Ana");
        assert_eq!(bet.surname, "Gomez");
        assert_eq!(bet.number, 42);
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = Bet::from_csv_line("Ana,Gomez,123", agency()).unwrap_err();
        assert_eq!(err, BetParseError::FieldCount { found: 3 });
    }

    #[test]
    fn test_parse_rejects_non_numeric_fields() {
        let err = Bet::from_csv_line("Ana,Gomez,12x,2000-01-01,42", agency()).unwrap_err();
        assert!(matches!(err, BetParseError::NotAnInteger { field: "document", .. }));

        let err = Bet::from_csv_line("Ana,Gomez,123,2000-01-01,-4", agency()).unwrap_err();
        assert!(matches!(err, BetParseError::NotAnInteger { field: "number", .. }));
    }

    #[test]
    fn test_parse_rejects_empty_and_reserved() {
        let err = Bet::from_csv_line(",Gomez,123,2000-01-01,42", agency()).unwrap_err();
        assert_eq!(err, BetParseError::EmptyField { field: "name" });

        let err = Bet::from_csv_line("An+a,Gomez,123,2000-01-01,42", agency()).unwrap_err();
        assert_eq!(err, BetParseError::ReservedCharacter { field: "name" });

        let err = Bet::from_csv_line("Ana,Go*mez,123,2000-01-01,42", agency()).unwrap_err();
        assert_eq!(err, BetParseError::ReservedCharacter { field: "surname" });
    }

    #[test]
    fn test_encode_layout() {
        let bet = Bet::from_csv_line("Ana,Gomez,123,2000-01-01,42", AgencyId::new(3)).unwrap();
        assert_eq!(bet.encode(), "3+Ana+Gomez+123+2000-01-01+42");
        assert_eq!(Bet::decode(&bet.encode()).unwrap(), bet);
    }

    #[test]
    fn test_decode_rejects_short_record() {
        assert_eq!(
            Bet::decode("3+Ana+Gomez").unwrap_err(),
            BetParseError::FieldCount { found: 3 }
        );
    }
}
