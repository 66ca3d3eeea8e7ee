use super::block;

/// Classifier output for one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lookup {
    /// No request to classify.
    NONE,
    HIT,
    MISS,
    /// A flush command is being looked up; neither hit nor miss.
    FLUSH,
}

/// What is looked up against the stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Probe {
    pub tag: u32,
    pub flush: bool,
}

/// Combine the stored entry of the relevant line with the probe.
///
/// `HIT = valid && tag matches && !flush`, `MISS = present && !HIT && !flush`.
#[inline]
#[must_use]
pub fn classify(stored: &block::Line, probe: Option<Probe>) -> Lookup {
    match probe {
        None => Lookup::NONE,
        Some(Probe { flush: true, .. }) => Lookup::FLUSH,
        Some(Probe { tag, .. }) if stored.is_valid() && stored.tag == tag => Lookup::HIT,
        Some(_) => Lookup::MISS,
    }
}

#[cfg(test)]
mod tests {
    use super::{classify, Lookup, Probe};
    use crate::cache::block::Line;

    fn probe(tag: u32) -> Option<Probe> {
        Some(Probe { tag, flush: false })
    }

    #[test]
    fn hit_needs_valid_and_matching_tag() {
        assert_eq!(classify(&Line::clean(7), probe(7)), Lookup::HIT);
        assert_eq!(classify(&Line::modified(7), probe(7)), Lookup::HIT);
        assert_eq!(classify(&Line::clean(7), probe(8)), Lookup::MISS);
        assert_eq!(classify(&Line::invalid(), probe(0)), Lookup::MISS);
    }

    #[test]
    fn flush_is_neither_hit_nor_miss() {
        let flush = Some(Probe { tag: 7, flush: true });
        assert_eq!(classify(&Line::clean(7), flush), Lookup::FLUSH);
        assert_eq!(classify(&Line::invalid(), flush), Lookup::FLUSH);
    }

    #[test]
    fn nothing_to_classify() {
        assert_eq!(classify(&Line::modified(1), None), Lookup::NONE);
    }
}
