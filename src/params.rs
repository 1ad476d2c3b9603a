//! The caller-facing parameter table.

use crate::error::Error;

/// Named parameters handed to a transformation.
///
/// Values are XPath expressions, matching how the underlying engine binds
/// caller parameters: `"42"` binds the number 42, `"'x'"` binds the string
/// `x`, and an unquoted bare word is evaluated as a path against the input
/// document. Slots reserved with [`Parameters::with_capacity`] but never
/// filled are simply absent from the table.
#[derive(Debug, Default, Clone)]
pub struct Parameters {
    slots: Vec<Option<(String, String)>>,
}

impl Parameters {
    pub fn new() -> Self {
        Parameters::default()
    }

    /// Reserve `count` slots, all initially empty.
    pub fn with_capacity(count: usize) -> Self {
        Parameters {
            slots: vec![None; count],
        }
    }

    /// Fill a reserved slot. Fails if `index` is outside the capacity the
    /// table was created with.
    pub fn set(&mut self, index: usize, name: &str, value: &str) -> Result<(), Error> {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = Some((name.to_string(), value.to_string()));
                Ok(())
            }
            None => Err(Error::ParameterIndex {
                index,
                len: self.slots.len(),
            }),
        }
    }

    /// Append a pair without pre-reserving.
    pub fn push(&mut self, name: &str, value: &str) {
        self.slots.push(Some((name.to_string(), value.to_string())));
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// The filled pairs, in slot order.
    pub(crate) fn pairs(&self) -> Vec<(String, String)> {
        self.slots.iter().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_fills_reserved_slots_in_order() {
        let mut params = Parameters::with_capacity(2);
        params.set(1, "b", "2").unwrap();
        params.set(0, "a", "1").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(
            params.pairs(),
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string())
            ]
        );
    }

    #[test]
    fn out_of_bounds_index_is_rejected() {
        let mut params = Parameters::with_capacity(1);
        assert!(matches!(
            params.set(1, "a", "1"),
            Err(Error::ParameterIndex { index: 1, len: 1 })
        ));
    }

    #[test]
    fn unfilled_slots_are_skipped() {
        let mut params = Parameters::with_capacity(3);
        params.set(1, "only", "'x'").unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params.pairs(), vec![("only".to_string(), "'x'".to_string())]);
    }

    #[test]
    fn push_appends() {
        let mut params = Parameters::new();
        assert!(params.is_empty());
        params.push("n", "42");
        assert_eq!(params.len(), 1);
        assert!(!params.is_empty());
    }
}
