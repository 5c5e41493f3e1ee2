//! Lookups over `(value, name)` tables for enumerated option types.

use crate::error::NameParseError;

/// Name of `value`, falling back to `"unknown"` for values missing from the table
pub(crate) fn name_of<T: PartialEq + Copy>(table: &[(T, &'static str)], value: T) -> &'static str {
    table
        .iter()
        .find(|(candidate, _)| *candidate == value)
        .map_or("unknown", |(_, name)| name)
}

/// Value whose name is exactly `input`
pub(crate) fn parse<T: Copy>(
    table: &[(T, &'static str)],
    kind: &'static str,
    input: &str,
) -> Result<T, NameParseError> {
    table
        .iter()
        .find(|(_, name)| *name == input)
        .map(|(value, _)| *value)
        .ok_or_else(|| {
            let names: Vec<&str> = table.iter().map(|(_, name)| *name).collect();
            NameParseError::new(kind, input, &names)
        })
}

/// Panic unless every value and every name in `table` appears once
#[cfg(test)]
pub(crate) fn assert_bijective<T: PartialEq + Copy + std::fmt::Debug>(table: &[(T, &'static str)]) {
    for (i, (value, name)) in table.iter().enumerate() {
        for (other_value, other_name) in &table[i + 1..] {
            assert_ne!(value, other_value, "duplicate value in name table");
            assert_ne!(name, other_name, "duplicate name in name table");
        }
        assert_eq!(parse(table, "test", name).ok(), Some(*value));
        assert_eq!(name_of(table, *value), *name);
    }
}
