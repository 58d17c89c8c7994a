use anyhow::{bail, Context};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A zero-based (row, column) cell position. Parses from and displays as A1 notation, e.g. `A1` is
/// `CellRef { row: 0, col: 0 }` and `AB12` is `CellRef { row: 11, col: 27 }`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

impl CellRef {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// The top-left cell, `A1`.
    pub fn origin() -> Self {
        Self::default()
    }
}

/// Converts a zero-based column index to its letters, e.g. 0 -> "A", 26 -> "AA".
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8_lossy(&letters).into_owned()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row + 1)
    }
}

impl FromStr for CellRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| c.is_ascii_digit())
            .with_context(|| format!("Cell reference '{s}' has no row number"))?;
        let (letters, digits) = s.split_at(split);
        if letters.is_empty() {
            bail!("Cell reference '{s}' has no column letters");
        }

        let mut col: usize = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                bail!("Invalid column letter '{c}' in cell reference '{s}'");
            }
            let value = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
            col = col
                .checked_mul(26)
                .and_then(|v| v.checked_add(value))
                .with_context(|| format!("Column in cell reference '{s}' is too large"))?;
        }

        let row: usize = digits
            .parse()
            .with_context(|| format!("Invalid row number in cell reference '{s}'"))?;
        if row == 0 {
            bail!("Row numbers start at 1, got cell reference '{s}'");
        }

        Ok(CellRef::new(row - 1, col - 1))
    }
}

impl Serialize for CellRef {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        CellRef::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_ref_parse() {
        assert_eq!("A1".parse::<CellRef>().unwrap(), CellRef::new(0, 0));
        assert_eq!("c7".parse::<CellRef>().unwrap(), CellRef::new(6, 2));
        assert_eq!("Z1".parse::<CellRef>().unwrap(), CellRef::new(0, 25));
        assert_eq!("AA10".parse::<CellRef>().unwrap(), CellRef::new(9, 26));
        assert_eq!("AB12".parse::<CellRef>().unwrap(), CellRef::new(11, 27));
    }

    #[test]
    fn test_cell_ref_parse_errors() {
        assert!("".parse::<CellRef>().is_err());
        assert!("A".parse::<CellRef>().is_err());
        assert!("12".parse::<CellRef>().is_err());
        assert!("A0".parse::<CellRef>().is_err());
        assert!("A-1".parse::<CellRef>().is_err());
        assert!("Ä1".parse::<CellRef>().is_err());
    }

    #[test]
    fn test_cell_ref_display() {
        assert_eq!(CellRef::origin().to_string(), "A1");
        assert_eq!(CellRef::new(9, 26).to_string(), "AA10");
        assert_eq!(CellRef::new(0, 701).to_string(), "ZZ1");
        assert_eq!(CellRef::new(0, 702).to_string(), "AAA1");
    }

    #[test]
    fn test_cell_ref_serde() {
        let json = serde_json::to_string(&CellRef::new(2, 3)).unwrap();
        assert_eq!(json, "\"D3\"");
        let back: CellRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CellRef::new(2, 3));
    }
}
