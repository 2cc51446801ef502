//! Field-by-field merge of optional overrides onto fully specified parameters.

/// A fully specified parameter record that can absorb a record of optional overrides.
///
/// Every field present in the partial record wins; every absent field keeps the
/// base value. Merging never fails: validation happens when the partial record is
/// accepted, not when it is applied.
pub trait Overlay: Sized {
    type Partial;

    fn overlay(&self, partial: &Self::Partial) -> Self;
}

/// Merge an optional override block onto `base`.
pub fn merge<T: Overlay + Clone>(base: &T, partial: Option<&T::Partial>) -> T {
    match partial {
        Some(partial) => base.overlay(partial),
        None => base.clone(),
    }
}

/// Implements [`Overlay`] for a record whose partial twin carries the same fields as `Option`s.
macro_rules! impl_overlay {
    ($full:ty => $partial:ty { $($field:ident),+ $(,)? }) => {
        impl $crate::params::overlay::Overlay for $full {
            type Partial = $partial;

            fn overlay(&self, partial: &$partial) -> Self {
                Self {
                    $($field: partial.$field.clone().unwrap_or_else(|| self.$field.clone()),)+
                }
            }
        }
    };
}

pub(crate) use impl_overlay;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Knobs {
        depth: u32,
        label: String,
    }

    #[derive(Debug, Default)]
    struct PartialKnobs {
        depth: Option<u32>,
        label: Option<String>,
    }

    impl_overlay!(Knobs => PartialKnobs { depth, label });

    fn base() -> Knobs {
        Knobs {
            depth: 3,
            label: "base".into(),
        }
    }

    #[test]
    fn test_present_fields_win() {
        let merged = base().overlay(&PartialKnobs {
            depth: Some(9),
            label: None,
        });
        assert_eq!(merged.depth, 9);
        assert_eq!(merged.label, "base");
    }

    #[test]
    fn test_empty_override_is_identity() {
        assert_eq!(base().overlay(&PartialKnobs::default()), base());
        assert_eq!(merge(&base(), None), base());
    }
}
