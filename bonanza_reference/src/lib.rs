//! Content-addressed identity for Bonanza: [`Reference`] (hash + size +
//! height + degree + parents-budget) and [`Contents`] (payload + outgoing
//! references), per spec §3/§4.1.

mod error;
mod outgoing;
mod reference;

pub use error::ReferenceError;
pub use outgoing::OutgoingReferences;
pub use reference::Contents;
pub use reference::DecodingParameters;
pub use reference::HashAlgorithm;
pub use reference::ObjectFormat;
pub use reference::Reference;

#[cfg(test)]
mod tests {
    use allocative::Allocative;
    use dupe::Dupe;

    use crate::Contents;
    use crate::ObjectFormat;
    use crate::Reference;

    fn leaf(format: &ObjectFormat, payload: &[u8]) -> Contents {
        Contents::new(format, Vec::new(), payload.to_vec()).unwrap()
    }

    #[test]
    fn reference_is_deterministic_over_payload() {
        let format = ObjectFormat::default();
        let c1 = leaf(&format, b"hello world");
        let c2 = leaf(&format, b"hello world");
        assert_eq!(c1.reference(), c2.reference());

        let c3 = leaf(&format, b"hello world!");
        assert_ne!(c1.reference(), c3.reference());
    }

    #[test]
    fn height_is_one_plus_max_child_height() {
        let format = ObjectFormat::default();
        let leaf_a = leaf(&format, b"a");
        let leaf_b = leaf(&format, b"b");
        assert_eq!(leaf_a.reference().height(), 0);

        let parent = Contents::new(
            &format,
            vec![leaf_a.reference().dupe(), leaf_b.reference().dupe()],
            b"parent".to_vec(),
        )
        .unwrap();
        assert_eq!(parent.reference().height(), 1);

        let grandparent =
            Contents::new(&format, vec![parent.reference().dupe()], b"gp".to_vec()).unwrap();
        assert_eq!(grandparent.reference().height(), 2);
    }

    #[test]
    fn references_are_totally_ordered_by_raw_bytes() {
        let format = ObjectFormat::default();
        let a = leaf(&format, b"a").reference().dupe();
        let b = leaf(&format, b"b").reference().dupe();
        let (lo, hi) = if a.to_bytes() < b.to_bytes() {
            (a, b)
        } else {
            (b, a)
        };
        assert!(lo < hi);
        assert_eq!(lo.cmp(&hi), std::cmp::Ordering::Less);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let format = ObjectFormat {
            max_object_size_bytes: 4,
            ..ObjectFormat::default()
        };
        let err = Contents::new(&format, Vec::new(), b"too big".to_vec()).unwrap_err();
        assert_matches::assert_matches!(err, crate::ReferenceError::PayloadTooLarge { .. });
    }

    #[test]
    fn over_degree_is_rejected() {
        let format = ObjectFormat {
            max_degree: 1,
            ..ObjectFormat::default()
        };
        let a = leaf(&format, b"a").reference().dupe();
        let b = leaf(&format, b"b").reference().dupe();
        let err = Contents::new(&format, vec![a, b], b"parent".to_vec()).unwrap_err();
        assert_matches::assert_matches!(err, crate::ReferenceError::TooManyReferences { .. });
    }

    #[derive(Allocative)]
    struct _AssertAllocative(Reference);
}
