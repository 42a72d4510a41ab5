//! Store-agnostic search predicates.
//!
//! A [`Predicate`] is a small expression tree. The in-memory store evaluates
//! it directly through [`Searchable`]; the Postgres store renders it to SQL.

use crate::models::Id;

/// Fields a keyword search can target, keyed by their one-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchType {
    Title,
    Content,
    Writer,
}

impl SearchType {
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            't' => Some(SearchType::Title),
            'c' => Some(SearchType::Content),
            'w' => Some(SearchType::Writer),
            _ => None,
        }
    }

    pub fn field(self) -> TextField {
        match self {
            SearchType::Title => TextField::Title,
            SearchType::Content => TextField::Content,
            SearchType::Writer => TextField::Writer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Title,
    Content,
    Writer,
}

impl TextField {
    pub fn column(self) -> &'static str {
        match self {
            TextField::Title => "title",
            TextField::Content => "content",
            TextField::Writer => "writer",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Always,
    /// Case-sensitive substring containment.
    Contains(TextField, String),
    IdGreaterThan(Id),
    Or(Vec<Predicate>),
    And(Vec<Predicate>),
}

/// Rows a predicate can be evaluated against in memory.
pub trait Searchable {
    fn id(&self) -> Id;
    fn text(&self, field: TextField) -> &str;
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Predicate::Always, p) | (p, Predicate::Always) => p,
            (Predicate::And(mut left), Predicate::And(right)) => {
                left.extend(right);
                Predicate::And(left)
            }
            (Predicate::And(mut left), p) => {
                left.push(p);
                Predicate::And(left)
            }
            (p, q) => Predicate::And(vec![p, q]),
        }
    }

    pub fn matches<S: Searchable + ?Sized>(&self, row: &S) -> bool {
        match self {
            Predicate::Always => true,
            Predicate::Contains(field, needle) => row.text(*field).contains(needle.as_str()),
            Predicate::IdGreaterThan(min) => row.id() > *min,
            Predicate::Or(any) => any.iter().any(|p| p.matches(row)),
            Predicate::And(all) => all.iter().all(|p| p.matches(row)),
        }
    }
}

/// OR of `<field> contains keyword` over the selected search types.
///
/// No types, or a missing/empty keyword, yields [`Predicate::Always`].
/// Repeated types contribute a single clause.
pub fn build_search_predicate(types: &[SearchType], keyword: Option<&str>) -> Predicate {
    let keyword = match keyword {
        Some(k) if !k.is_empty() => k,
        _ => return Predicate::Always,
    };
    let mut clauses: Vec<Predicate> = Vec::new();
    for t in types {
        let clause = Predicate::Contains(t.field(), keyword.to_string());
        if !clauses.contains(&clause) {
            clauses.push(clause);
        }
    }
    match clauses.len() {
        0 => Predicate::Always,
        1 => clauses.remove(0),
        _ => Predicate::Or(clauses),
    }
}

/// Guard applied to every board search: `bno > 0`.
pub fn base_filter() -> Predicate {
    Predicate::IdGreaterThan(0)
}

/// `base_filter() AND build_search_predicate(types, keyword)`.
pub fn board_filter(types: &[SearchType], keyword: Option<&str>) -> Predicate {
    base_filter().and(build_search_predicate(types, keyword))
}
