//! Field merge decisions.
//!
//! Four side-effect-free questions, one per cell of {scalar, relationship} ×
//! {general, sidecar}. Each first asks whether the candidate is eligible at all
//! (non-empty and different from what is stored) and only then who wins.
//!
//! A consequence worth knowing: these functions never let a less trusted
//! source fill a field that a more trusted source left empty. The field's
//! stored source keeps its rank even when its value is blank.
//!
//! Scalars are compared with surrounding whitespace trimmed from both sides,
//! and callers store the trimmed value. `"Dune "` over a stored `"Dune"` is
//! therefore "unchanged", and a rescan never rewrites a value that differs
//! only in padding.

use crate::source::DataSource;

fn scalar_is_candidate(new: &str, existing: &str) -> bool {
    let new = new.trim();
    !new.is_empty() && new != existing.trim()
}

fn relationship_is_candidate<T: PartialEq>(new: &[T], existing: &[T]) -> bool {
    !new.is_empty() && new != existing
}

/// Should a single-valued field be overwritten?
///
/// `force_refresh` bypasses the rank comparison but never the emptiness or
/// equality checks.
pub fn should_update_scalar(
    new: &str,
    existing: &str,
    new_source: &DataSource,
    existing_source: &DataSource,
    force_refresh: bool,
) -> bool {
    if !scalar_is_candidate(new, existing) {
        return false;
    }
    force_refresh || new_source.can_override(existing_source)
}

/// Should an ordered relationship list be replaced wholesale?
///
/// Equality is element-wise and order-sensitive: a reordering is a change.
pub fn should_update_relationship<T: PartialEq>(
    new: &[T],
    existing: &[T],
    new_source: &DataSource,
    existing_source: &DataSource,
    force_refresh: bool,
) -> bool {
    if !relationship_is_candidate(new, existing) {
        return false;
    }
    force_refresh || new_source.can_override(existing_source)
}

/// Should a sidecar value be applied over a stored one?
///
/// Sidecars are ignored entirely during a forced refresh, and only apply over
/// strictly less trusted values.
pub fn should_apply_sidecar_scalar(new: &str, existing: &str, existing_source: &DataSource, force_refresh: bool) -> bool {
    if force_refresh || !scalar_is_candidate(new, existing) {
        return false;
    }
    DataSource::Sidecar.rank() < existing_source.rank()
}

/// Relationship counterpart of [`should_apply_sidecar_scalar`].
pub fn should_apply_sidecar_relationship<T: PartialEq>(
    new: &[T],
    existing: &[T],
    existing_source: &DataSource,
    force_refresh: bool,
) -> bool {
    if force_refresh || !relationship_is_candidate(new, existing) {
        return false;
    }
    DataSource::Sidecar.rank() < existing_source.rank()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn all_sources() -> Vec<DataSource> {
        vec![
            DataSource::Manual,
            DataSource::Sidecar,
            DataSource::plugin("acme", "enrich"),
            DataSource::EpubMetadata,
            DataSource::CbzMetadata,
            DataSource::M4bMetadata,
            DataSource::ExistingCover,
            DataSource::Filepath,
            DataSource::Unknown("legacy".into()),
        ]
    }

    #[test]
    fn test_identical_value_never_updates() {
        for a in all_sources() {
            for b in all_sources() {
                for force in [false, true] {
                    assert!(!should_update_scalar("Dune", "Dune", &a, &b, force), "{a} over {b} (force={force})");
                    assert!(!should_update_relationship(&["A"], &["A"], &a, &b, force));
                }
            }
        }
    }

    #[test]
    fn test_empty_value_never_updates() {
        for a in all_sources() {
            for b in all_sources() {
                for force in [false, true] {
                    assert!(!should_update_scalar("", "Dune", &a, &b, force));
                    assert!(!should_update_scalar("   ", "Dune", &a, &b, force));
                    assert!(!should_update_relationship::<&str>(&[], &["A"], &a, &b, force));
                }
            }
        }
    }

    #[test]
    fn test_force_bypasses_rank() {
        for a in all_sources() {
            for b in all_sources() {
                assert!(should_update_scalar("New", "Old", &a, &b, true), "{a} over {b}");
                assert!(should_update_scalar("New", "", &a, &b, true));
            }
        }
    }

    #[rstest]
    #[case::same_source(DataSource::EpubMetadata, DataSource::EpubMetadata, true)]
    #[case::more_trusted(DataSource::Sidecar, DataSource::EpubMetadata, true)]
    #[case::less_trusted(DataSource::Filepath, DataSource::EpubMetadata, false)]
    #[case::plugin_over_format(DataSource::plugin("a", "b"), DataSource::CbzMetadata, true)]
    #[case::format_over_manual(DataSource::EpubMetadata, DataSource::Manual, false)]
    #[case::unknown_is_filepath(DataSource::Filepath, DataSource::Unknown("x".into()), true)]
    fn test_scalar_rank(#[case] new: DataSource, #[case] existing: DataSource, #[case] expected: bool) {
        assert_eq!(should_update_scalar("New", "Old", &new, &existing, false), expected);
    }

    #[test]
    fn test_relationship_order_matters() {
        let source = DataSource::EpubMetadata;
        assert!(should_update_relationship(&["B", "A"], &["A", "B"], &source, &source, false));
        assert!(should_update_relationship(&["A", "B"], &[], &source, &source, false));
    }

    #[test]
    fn test_sidecar_skipped_under_force() {
        for existing in all_sources() {
            assert!(!should_apply_sidecar_scalar("New", "Old", &existing, true));
            assert!(!should_apply_sidecar_relationship(&["A"], &["B"], &existing, true));
        }
    }

    #[rstest]
    #[case::over_manual(DataSource::Manual, false)]
    #[case::over_sidecar(DataSource::Sidecar, false)]
    #[case::over_plugin(DataSource::plugin("a", "b"), true)]
    #[case::over_format(DataSource::M4bMetadata, true)]
    #[case::over_filepath(DataSource::Filepath, true)]
    fn test_sidecar_rank_is_strict(#[case] existing: DataSource, #[case] expected: bool) {
        assert_eq!(should_apply_sidecar_scalar("New", "Old", &existing, false), expected);
        assert_eq!(should_apply_sidecar_relationship(&["New"], &["Old"], &existing, false), expected);
    }

    #[rstest]
    #[case::trailing("Dune ", "Dune")]
    #[case::leading("  Dune", "Dune")]
    #[case::stored_padded("Dune", " Dune\t")]
    fn test_padding_is_not_a_change(#[case] new: &str, #[case] existing: &str) {
        for force in [false, true] {
            let source = DataSource::EpubMetadata;
            assert!(!should_update_scalar(new, existing, &source, &source, force));
            assert!(!should_apply_sidecar_scalar(new, existing, &DataSource::Filepath, force));
        }
    }

    #[test]
    fn test_sidecar_unchanged_is_noop() {
        assert!(!should_apply_sidecar_scalar("Same", "Same", &DataSource::Filepath, false));
        assert!(!should_apply_sidecar_scalar("", "Old", &DataSource::Filepath, false));
    }
}
