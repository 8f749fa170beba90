use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*`, matching exactly one segment.
    Wildcard,
}

struct Method<H> {
    pattern: String,
    segments: Vec<Segment>,
    handler: H,
}

/// Table of address patterns and their handlers.
///
/// Patterns are `/` delimited; a `*` segment matches exactly one segment of
/// an address. When several patterns match, the one with a literal segment at
/// the earliest position where the candidates differ wins.
pub struct AddressSpace<H> {
    methods: Vec<Method<H>>,
}

impl<H> Default for AddressSpace<H> {
    fn default() -> Self {
        Self {
            methods: Vec::new(),
        }
    }
}

impl<H> fmt::Debug for AddressSpace<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.methods.iter().map(|method| &method.pattern))
            .finish()
    }
}

fn split(address: &str) -> impl Iterator<Item = &str> {
    address.split('/').filter(|segment| !segment.is_empty())
}

impl<H> AddressSpace<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `pattern`. Re-registering a pattern replaces
    /// its handler.
    pub fn register(&mut self, pattern: &str, handler: H) {
        let segments: Vec<Segment> = split(pattern)
            .map(|segment| match segment {
                "*" => Segment::Wildcard,
                literal => Segment::Literal(literal.to_string()),
            })
            .collect();

        if let Some(existing) = self.methods.iter_mut().find(|m| m.segments == segments) {
            existing.handler = handler;
            return;
        }

        self.methods.push(Method {
            pattern: pattern.to_string(),
            segments,
            handler,
        });
    }

    /// Finds the handler of the most specific pattern matching `address`.
    pub fn lookup(&self, address: &str) -> Option<&H> {
        let parts: Vec<&str> = split(address).collect();
        let mut best: Option<&Method<H>> = None;
        for method in self.methods.iter().filter(|m| matches(&m.segments, &parts)) {
            best = match best {
                Some(current) if specificity(&method.segments, &current.segments) != Ordering::Greater => {
                    Some(current)
                }
                _ => Some(method),
            };
        }
        best.map(|method| &method.handler)
    }

    /// Patterns in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|method| method.pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

fn matches(segments: &[Segment], parts: &[&str]) -> bool {
    segments.len() == parts.len()
        && segments.iter().zip(parts).all(|(segment, part)| match segment {
            Segment::Wildcard => true,
            Segment::Literal(literal) => literal == part,
        })
}

/// Compares two patterns matching the same address.
fn specificity(a: &[Segment], b: &[Segment]) -> Ordering {
    for (left, right) in a.iter().zip(b) {
        match (left, right) {
            (Segment::Literal(_), Segment::Wildcard) => return Ordering::Greater,
            (Segment::Wildcard, Segment::Literal(_)) => return Ordering::Less,
            _ => {}
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards_match_exactly_one_segment() {
        let mut space = AddressSpace::new();
        space.register("/get/group/*/list/*/*", 1);

        assert_eq!(space.lookup("/get/group/5/list/0/3"), Some(&1));
        assert_eq!(space.lookup("/get/group/list/0/3"), None);
        assert_eq!(space.lookup("/get/group/5/6/list/0/3"), None);
        assert_eq!(space.lookup("/get/macro/5/list/0/3"), None);
    }

    #[test]
    fn test_literal_segments_win() {
        let mut space = AddressSpace::new();
        space.register("/get/cue/*/*/*/list/*/*", "part");
        space.register("/get/cue/*/*/noparts/list/*/*", "cue");
        space.register("/get/group/*", "index");
        space.register("/get/group/count", "count");

        assert_eq!(space.lookup("/get/cue/1/2/noparts/list/0/1"), Some(&"cue"));
        assert_eq!(space.lookup("/get/cue/1/2/3/list/0/1"), Some(&"part"));
        assert_eq!(space.lookup("/get/group/count"), Some(&"count"));
        assert_eq!(space.lookup("/get/group/12"), Some(&"index"));
    }

    #[test]
    fn test_earliest_literal_decides() {
        let mut space = AddressSpace::new();
        space.register("/a/*/c", "late");
        space.register("/a/b/*", "early");

        assert_eq!(space.lookup("/a/b/c"), Some(&"early"));
    }

    #[test]
    fn test_reregistering_replaces_handler() {
        let mut space = AddressSpace::new();
        space.register("/ping", 1);
        space.register("/ping", 2);

        assert_eq!(space.len(), 1);
        assert_eq!(space.lookup("/ping"), Some(&2));
    }
}
