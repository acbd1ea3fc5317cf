//! The conflict-detecting registry of `(method, path)` pairs, backed by
//! an N-ary trie keyed per segment.

use super::{Method, Path, Segment};

use std::collections::BTreeMap;
use std::fmt;

/// Why a path could not be registered. Both involved paths are named so
/// the caller can anchor one diagnostic at each declaration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Conflict {
    Duplicate { existing: String, added: String },
    ParamVsLiteral { param: String, literal: String },
    CatchAll { catch_all: String, other: String },
}

impl Conflict {
    /// The two conflicting paths, existing first.
    pub fn paths(&self) -> (&str, &str) {
        match self {
            Conflict::Duplicate { existing, added } => (existing, added),
            Conflict::ParamVsLiteral { param, literal } => (literal, param),
            Conflict::CatchAll { catch_all, other } => (catch_all, other),
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Conflict::Duplicate { existing, added } => write!(
                f,
                "path '{}' conflicts with the already registered path '{}'",
                added, existing
            ),
            Conflict::ParamVsLiteral { param, literal } => write!(
                f,
                "cannot combine parameter '{}' with path '{}'",
                param, literal
            ),
            Conflict::CatchAll { catch_all, other } => write!(
                f,
                "cannot combine path '{}' with the catch-all path '{}'",
                other, catch_all
            ),
        }
    }
}

impl std::error::Error for Conflict {}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CatchKind {
    Wildcard,
    Fallback,
}

#[derive(Debug, Default)]
struct Node {
    literals: BTreeMap<String, Node>,
    param: Option<Box<Node>>,
    param_name: Option<String>,
    catch_all: Option<CatchAllNode>,
    /// Methods of paths terminating at this node.
    methods: BTreeMap<Method, String>,
    /// First registered path routed through this node.
    witness: Option<String>,
}

#[derive(Debug)]
struct CatchAllNode {
    kind: CatchKind,
    methods: BTreeMap<Method, String>,
    witness: String,
}

/// Keyed lookup and conflict detection for registered paths.
#[derive(Debug, Default)]
pub struct PathRegistry {
    root: Node,
    len: usize,
}

impl PathRegistry {
    pub fn new() -> Self {
        PathRegistry::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Registers a path under a method, or reports the conflict that
    /// prevents it. A `*` method collides with every concrete method at
    /// the same leaf, and vice versa.
    pub fn add(&mut self, method: Method, path: &Path) -> Result<(), Conflict> {
        let rendered = path.to_string();
        let mut node = &mut self.root;
        let nsegs = path.segments.len();

        for (i, seg) in path.segments.iter().enumerate() {
            let last = i + 1 == nsegs;

            // A registered catch-all absorbs everything below this node.
            if let Some(ca) = &node.catch_all {
                let same_kind = matches!(
                    (seg, ca.kind),
                    (Segment::Wildcard { .. }, CatchKind::Wildcard)
                        | (Segment::Fallback { .. }, CatchKind::Fallback)
                );
                if !(last && same_kind) {
                    return Err(Conflict::CatchAll {
                        catch_all: ca.witness.clone(),
                        other: rendered,
                    });
                }
            }

            match seg {
                Segment::Literal(lit) => {
                    if node.param.is_some() {
                        let name =
                            node.param_name.clone().unwrap_or_default();
                        return Err(Conflict::ParamVsLiteral {
                            param: format!(":{}", name),
                            literal: rendered,
                        });
                    }
                    node = node
                        .literals
                        .entry(lit.clone())
                        .or_insert_with(Node::default);
                    if node.witness.is_none() {
                        node.witness = Some(rendered.clone());
                    }
                }
                Segment::Param { name, .. } => {
                    if let Some(child) = node.literals.values().next() {
                        let literal = child
                            .witness
                            .clone()
                            .unwrap_or_else(|| rendered.clone());
                        return Err(Conflict::ParamVsLiteral {
                            param: format!(":{}", name),
                            literal,
                        });
                    }
                    if node.param.is_none() {
                        node.param_name = Some(name.clone());
                        node.param = Some(Box::new(Node::default()));
                    }
                    node = node.param.as_deref_mut().expect("param child");
                    if node.witness.is_none() {
                        node.witness = Some(rendered.clone());
                    }
                }
                Segment::Wildcard { .. } | Segment::Fallback { .. } => {
                    if let Some(child) = node.literals.values().next() {
                        let other = child
                            .witness
                            .clone()
                            .unwrap_or_else(|| rendered.clone());
                        return Err(Conflict::CatchAll {
                            catch_all: rendered,
                            other,
                        });
                    }
                    if let Some(child) = &node.param {
                        let other = child
                            .witness
                            .clone()
                            .unwrap_or_else(|| rendered.clone());
                        return Err(Conflict::CatchAll {
                            catch_all: rendered,
                            other,
                        });
                    }
                    let kind = match seg {
                        Segment::Wildcard { .. } => CatchKind::Wildcard,
                        _ => CatchKind::Fallback,
                    };
                    let ca = node.catch_all.get_or_insert_with(|| {
                        CatchAllNode {
                            kind,
                            methods: BTreeMap::new(),
                            witness: rendered.clone(),
                        }
                    });
                    add_method(&mut ca.methods, method, &rendered)?;
                    self.len += 1;
                    return Ok(());
                }
            }
        }

        add_method(&mut node.methods, method, &rendered)?;
        self.len += 1;
        Ok(())
    }
}

fn add_method(
    methods: &mut BTreeMap<Method, String>,
    method: Method,
    rendered: &str,
) -> Result<(), Conflict> {
    if let Some(existing) = methods.get(&Method::Star) {
        return Err(Conflict::Duplicate {
            existing: existing.clone(),
            added: rendered.to_string(),
        });
    }
    if method == Method::Star {
        if let Some(existing) = methods.values().next() {
            return Err(Conflict::Duplicate {
                existing: existing.clone(),
                added: rendered.to_string(),
            });
        }
    }
    if let Some(existing) = methods.get(&method) {
        return Err(Conflict::Duplicate {
            existing: existing.clone(),
            added: rendered.to_string(),
        });
    }
    methods.insert(method, rendered.to_string());
    Ok(())
}

#[cfg(test)]
mod registry_tests {
    use super::super::parse;
    use super::*;

    use rstest::*;

    fn add(
        reg: &mut PathRegistry,
        method: Method,
        raw: &str,
    ) -> Result<(), Conflict> {
        reg.add(method, &parse(raw).unwrap())
    }

    #[rstest]
    fn identical_paths_are_duplicates() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Post, "/foo").unwrap();
        let err = add(&mut reg, Method::Post, "/foo").unwrap_err();
        match err {
            Conflict::Duplicate { existing, added } => {
                assert_eq!(existing, "/foo");
                assert_eq!(added, "/foo");
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
    }

    #[rstest]
    fn param_name_erasure_makes_duplicates() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Post, "/moo/:bar").unwrap();
        let err = add(&mut reg, Method::Post, "/moo/:baz").unwrap_err();
        match err {
            Conflict::Duplicate { existing, added } => {
                assert_eq!(existing, "/moo/:bar");
                assert_eq!(added, "/moo/:baz");
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
    }

    #[rstest]
    fn literal_and_param_conflict() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Post, "/foo/bar").unwrap();
        let err = add(&mut reg, Method::Post, "/foo/:bar").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot combine parameter ':bar' with path '/foo/bar'"
        );
    }

    #[rstest]
    fn wildcard_differs_by_method_but_not_star() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Get, "/:a/*w").unwrap();
        add(&mut reg, Method::Post, "/:a/*w").unwrap();
        let err = add(&mut reg, Method::Star, "/:a/*w").unwrap_err();
        assert!(matches!(err, Conflict::Duplicate { .. }));
    }

    #[rstest]
    fn star_registration_blocks_concrete_methods() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Star, "/raw").unwrap();
        let err = add(&mut reg, Method::Get, "/raw").unwrap_err();
        assert!(matches!(err, Conflict::Duplicate { .. }));
    }

    #[rstest]
    fn wildcard_conflicts_with_siblings() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Get, "/files/static").unwrap();
        let err = add(&mut reg, Method::Get, "/files/*rest").unwrap_err();
        assert!(matches!(err, Conflict::CatchAll { .. }));
        let (a, b) = err.paths();
        assert_eq!(a, "/files/*rest");
        assert_eq!(b, "/files/static");
    }

    #[rstest]
    fn catch_all_absorbs_later_paths() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Get, "/files/*rest").unwrap();
        let err = add(&mut reg, Method::Get, "/files/static").unwrap_err();
        match err {
            Conflict::CatchAll { catch_all, other } => {
                assert_eq!(catch_all, "/files/*rest");
                assert_eq!(other, "/files/static");
            }
            other => panic!("unexpected conflict: {:?}", other),
        }
    }

    #[rstest(
        first,
        second,
        case("/a/b", "/a/:p"),
        case("/a/:p", "/a/b"),
        case("/x", "/x"),
        case("/w/*all", "/w/other"),
        case("/f/!fb", "/f/:p")
    )]
    fn conflicts_are_symmetric(first: &str, second: &str) {
        let mut forward = PathRegistry::new();
        add(&mut forward, Method::Get, first).unwrap();
        let forward_err = add(&mut forward, Method::Get, second).is_err();

        let mut backward = PathRegistry::new();
        add(&mut backward, Method::Get, second).unwrap();
        let backward_err = add(&mut backward, Method::Get, first).is_err();

        assert!(forward_err);
        assert_eq!(forward_err, backward_err);
    }

    #[rstest]
    fn root_path_registers_once() {
        let mut reg = PathRegistry::new();
        add(&mut reg, Method::Get, "/").unwrap();
        assert!(add(&mut reg, Method::Get, "/").is_err());
        assert_eq!(reg.len(), 1);
    }
}
