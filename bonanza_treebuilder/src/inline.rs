/// A subtree competing for a slot in the parent message being built
/// (spec §4.5 "Inlined-Tree Builder").
pub trait InlineCandidate {
    /// Bytes this subtree occupies if left inlined in the parent.
    fn inline_size_bytes(&self) -> usize;

    /// Bytes the parent would instead pay if this subtree were
    /// externalized (i.e. the size of the reference placeholder that
    /// replaces the inline content). `None` means this candidate cannot
    /// be externalized at all and is always inlined ("forced inline"
    /// per spec §4.5).
    fn external_size_bytes(&self) -> Option<usize>;
}

/// The outcome of [`build_inlined_tree`]: which candidates stayed
/// inline and which were externalized, each in original relative order.
pub struct InlineDecision<C> {
    pub inlined: Vec<C>,
    pub externalized: Vec<C>,
}

/// Chooses which candidates to externalize so the resulting message's
/// encoded size is at most `max_object_size_bytes`. Ports spec §4.5's
/// algorithm verbatim: try inlining everything; if that already fits,
/// stop. Otherwise repeatedly externalize the still-inlined candidate
/// whose `inline_size_bytes - external_size_bytes` byte saving is
/// smallest (ties broken by original candidate-list order, per
/// `SPEC_FULL.md`'s open-question decision), until the message fits or
/// nothing externalizable remains.
pub fn build_inlined_tree<C: InlineCandidate>(
    candidates: Vec<C>,
    max_object_size_bytes: usize,
) -> InlineDecision<C> {
    let mut externalized = vec![false; candidates.len()];

    loop {
        let total: usize = candidates
            .iter()
            .zip(externalized.iter())
            .map(|(c, &is_external)| {
                if is_external {
                    c.external_size_bytes().unwrap_or_else(|| c.inline_size_bytes())
                } else {
                    c.inline_size_bytes()
                }
            })
            .sum();
        if total <= max_object_size_bytes {
            break;
        }

        let pick = candidates
            .iter()
            .enumerate()
            .filter(|(i, _)| !externalized[*i])
            .filter_map(|(i, c)| {
                c.external_size_bytes()
                    .map(|ext| (i, c.inline_size_bytes().saturating_sub(ext)))
            })
            .min_by_key(|&(i, saving)| (saving, i));

        match pick {
            Some((i, _)) => externalized[i] = true,
            // Nothing left that can be externalized: the message stays
            // over budget; the caller decides how to surface that.
            None => break,
        }
    }

    let mut inlined = Vec::new();
    let mut externalized_out = Vec::new();
    for (c, is_external) in candidates.into_iter().zip(externalized) {
        if is_external {
            externalized_out.push(c);
        } else {
            inlined.push(c);
        }
    }
    InlineDecision {
        inlined,
        externalized: externalized_out,
    }
}
