//! Builds the storage-agnostic filter, sort and page specification for listing
//! and searching a user's transactions.
//!
//! Nothing in here touches a database. [crate::transaction::sql] translates a
//! [TransactionQuery] into a parameterized SQLite query and
//! [TransactionQuery::apply] evaluates one against records in memory.

use std::cmp::Ordering;

use crate::{
    transaction::{Transaction, normalize_category},
    user::UserID,
};

/// The transaction fields a query may refer to.
///
/// This is the only source of column names that are written into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Owner,
    Amount,
    Type,
    Category,
    Description,
    Note,
    CreatedAt,
    UpdatedAt,
}

impl Field {
    /// The column that stores this field.
    pub fn column(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Owner => "user_id",
            Field::Amount => "amount",
            Field::Type => "type",
            Field::Category => "category",
            Field::Description => "description",
            Field::Note => "note",
            Field::CreatedAt => "created_at",
            Field::UpdatedAt => "updated_at",
        }
    }
}

/// The fields searched by free-text queries.
pub const SEARCH_FIELDS: [Field; 4] = [
    Field::Description,
    Field::Note,
    Field::Type,
    Field::Category,
];

/// A value that a field is compared against.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Text(String),
}

/// A single condition on a transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// The field equals the value.
    Equals(Field, FilterValue),
    /// The field equals one of the values.
    In(Field, Vec<FilterValue>),
    /// The field contains the needle, ignoring case. The needle is stored lowercase.
    ContainsIgnoreCase(Field, String),
    /// At least one of the predicates holds.
    AnyOf(Vec<Predicate>),
}

/// An ordered conjunction of predicates.
///
/// The first predicate is always the owner clause. It can only be created
/// with [FilterSpec::for_owner], so there is no way to build a filter that
/// is not restricted to a single user.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSpec {
    predicates: Vec<Predicate>,
}

impl FilterSpec {
    /// Create a filter that matches every transaction owned by `owner`.
    pub fn for_owner(owner: UserID) -> Self {
        Self {
            predicates: vec![Predicate::Equals(
                Field::Owner,
                FilterValue::Integer(owner.as_i64()),
            )],
        }
    }

    fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// The predicates in order, starting with the owner clause.
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Check whether `transaction` satisfies every predicate.
    pub fn matches(&self, transaction: &Transaction) -> bool {
        self.predicates
            .iter()
            .all(|predicate| predicate_matches(predicate, transaction))
    }
}

fn field_value(field: Field, transaction: &Transaction) -> FilterValue {
    match field {
        Field::Id => FilterValue::Integer(transaction.id),
        Field::Owner => FilterValue::Integer(transaction.user_id.as_i64()),
        Field::Type => FilterValue::Text(transaction.kind.as_str().to_owned()),
        Field::Category => FilterValue::Text(transaction.category.clone()),
        Field::Description => FilterValue::Text(transaction.description.clone()),
        Field::Note => FilterValue::Text(transaction.note.clone()),
        Field::Amount => FilterValue::Text(transaction.amount.to_string()),
        Field::CreatedAt => FilterValue::Text(transaction.created_at.to_string()),
        Field::UpdatedAt => FilterValue::Text(transaction.updated_at.to_string()),
    }
}

fn predicate_matches(predicate: &Predicate, transaction: &Transaction) -> bool {
    match predicate {
        Predicate::Equals(field, value) => field_value(*field, transaction) == *value,
        Predicate::In(field, values) => values.contains(&field_value(*field, transaction)),
        Predicate::ContainsIgnoreCase(field, needle) => match field_value(*field, transaction) {
            FilterValue::Text(text) => text.to_lowercase().contains(needle.as_str()),
            FilterValue::Integer(_) => false,
        },
        Predicate::AnyOf(predicates) => predicates
            .iter()
            .any(|predicate| predicate_matches(predicate, transaction)),
    }
}

/// Build the filter for `owner` from a free-text search and category filters.
///
/// Clauses are added in the order owner, search, category:
/// - A non-blank `search` matches any of [SEARCH_FIELDS] case-insensitively.
/// - Categories are trimmed and lowercased, blank entries and "all" are
///   dropped and duplicates are removed. One remaining category gives an
///   equality clause, more than one a set-membership clause and none no
///   clause at all.
pub fn build_filter(owner: UserID, search: &str, categories: &[String]) -> FilterSpec {
    let mut filter = FilterSpec::for_owner(owner);

    let search = search.trim();
    if !search.is_empty() {
        let needle = search.to_lowercase();
        filter = filter.and(Predicate::AnyOf(
            SEARCH_FIELDS
                .iter()
                .map(|field| Predicate::ContainsIgnoreCase(*field, needle.clone()))
                .collect(),
        ));
    }

    let mut wanted: Vec<String> = Vec::new();
    for category in categories {
        let category = normalize_category(category);

        if category.is_empty() || category == "all" || wanted.contains(&category) {
            continue;
        }

        wanted.push(category);
    }

    filter = match wanted.len() {
        0 => filter,
        1 => filter.and(Predicate::Equals(
            Field::Category,
            FilterValue::Text(wanted.remove(0)),
        )),
        _ => filter.and(Predicate::In(
            Field::Category,
            wanted.into_iter().map(FilterValue::Text).collect(),
        )),
    };

    filter
}

/// The direction of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// The order to list transactions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Most recently created first.
    #[default]
    NewestFirst,
    OldestFirst,
    /// Smallest amount first.
    AmountAscending,
    AmountDescending,
}

impl SortOrder {
    /// Map a client supplied keyword to a sort order, ignoring case.
    ///
    /// Unknown and empty keywords give [SortOrder::NewestFirst].
    pub fn from_keyword(keyword: &str) -> Self {
        match keyword.trim().to_lowercase().as_str() {
            "oldest" => SortOrder::OldestFirst,
            "asc" | "amount_asc" => SortOrder::AmountAscending,
            "desc" | "amount_desc" => SortOrder::AmountDescending,
            _ => SortOrder::NewestFirst,
        }
    }

    /// The sort keys, ending with the ID so that the order is total.
    pub fn keys(self) -> [(Field, Direction); 2] {
        match self {
            SortOrder::NewestFirst => [
                (Field::CreatedAt, Direction::Descending),
                (Field::Id, Direction::Descending),
            ],
            SortOrder::OldestFirst => [
                (Field::CreatedAt, Direction::Ascending),
                (Field::Id, Direction::Ascending),
            ],
            SortOrder::AmountAscending => [
                (Field::Amount, Direction::Ascending),
                (Field::Id, Direction::Ascending),
            ],
            SortOrder::AmountDescending => [
                (Field::Amount, Direction::Descending),
                (Field::Id, Direction::Descending),
            ],
        }
    }

    /// Compare two transactions by this sort order.
    pub fn compare(self, a: &Transaction, b: &Transaction) -> Ordering {
        self.keys()
            .iter()
            .map(|(field, direction)| {
                let ordering = match field {
                    Field::Amount => a.amount.total_cmp(&b.amount),
                    Field::CreatedAt => a.created_at.cmp(&b.created_at),
                    _ => a.id.cmp(&b.id),
                };

                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

/// The number of transactions per page when the client does not ask for a valid limit.
pub const DEFAULT_LIMIT: u32 = 10;

/// The most transactions a single page may hold.
pub const MAX_LIMIT: u32 = 100;

/// Which slice of the sorted results to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Parse the raw `limit` and `offset` query parameters.
    ///
    /// A missing, non-numeric, zero or negative limit gives [DEFAULT_LIMIT],
    /// never an unbounded page, and limits above [MAX_LIMIT] are capped. A
    /// missing, non-numeric or negative offset gives zero.
    pub fn from_params(limit: Option<&str>, offset: Option<&str>) -> Self {
        let limit = match limit.and_then(|limit| limit.trim().parse::<i64>().ok()) {
            Some(limit) if limit > 0 => limit.min(i64::from(MAX_LIMIT)) as u32,
            _ => DEFAULT_LIMIT,
        };

        let offset = match offset.and_then(|offset| offset.trim().parse::<i64>().ok()) {
            Some(offset) if offset >= 0 => u32::try_from(offset).unwrap_or(u32::MAX),
            _ => 0,
        };

        Self { limit, offset }
    }
}

/// Everything needed to list a page of a user's transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionQuery {
    pub filter: FilterSpec,
    pub sort: SortOrder,
    pub pagination: Pagination,
}

impl TransactionQuery {
    /// Build a query for `owner` from the raw request parameters.
    pub fn build(
        owner: UserID,
        search: &str,
        categories: &[String],
        sort_keyword: &str,
        pagination: Pagination,
    ) -> Self {
        Self {
            filter: build_filter(owner, search, categories),
            sort: SortOrder::from_keyword(sort_keyword),
            pagination,
        }
    }

    /// Evaluate the query against `transactions` in memory.
    pub fn apply<'a>(
        &self,
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> Vec<&'a Transaction> {
        let mut selected: Vec<&Transaction> = transactions
            .into_iter()
            .filter(|transaction| self.filter.matches(transaction))
            .collect();

        selected.sort_by(|a, b| self.sort.compare(a, b));

        selected
            .into_iter()
            .skip(self.pagination.offset as usize)
            .take(self.pagination.limit as usize)
            .collect()
    }
}


#[cfg(test)]
mod sort_order_tests {
    use super::SortOrder;

    #[test]
    fn keywords_map_to_sort_orders() {
        assert_eq!(SortOrder::from_keyword("newest"), SortOrder::NewestFirst);
        assert_eq!(SortOrder::from_keyword("oldest"), SortOrder::OldestFirst);
        assert_eq!(SortOrder::from_keyword("asc"), SortOrder::AmountAscending);
        assert_eq!(SortOrder::from_keyword("amount_asc"), SortOrder::AmountAscending);
        assert_eq!(SortOrder::from_keyword("desc"), SortOrder::AmountDescending);
        assert_eq!(
            SortOrder::from_keyword("amount_desc"),
            SortOrder::AmountDescending
        );
    }

    #[test]
    fn keywords_ignore_case() {
        assert_eq!(SortOrder::from_keyword("ASC"), SortOrder::AmountAscending);
        assert_eq!(SortOrder::from_keyword(" Oldest "), SortOrder::OldestFirst);
    }

    #[test]
    fn unknown_keyword_is_newest_first() {
        assert_eq!(SortOrder::from_keyword("bogus"), SortOrder::from_keyword(""));
        assert_eq!(SortOrder::from_keyword("bogus"), SortOrder::NewestFirst);
        assert_eq!(SortOrder::default(), SortOrder::NewestFirst);
    }
}

#[cfg(test)]
mod pagination_tests {
    use super::{DEFAULT_LIMIT, MAX_LIMIT, Pagination};

    #[test]
    fn missing_params_use_defaults() {
        assert_eq!(Pagination::from_params(None, None), Pagination::default());
        assert_eq!(
            Pagination::default(),
            Pagination {
                limit: DEFAULT_LIMIT,
                offset: 0
            }
        );
    }

    #[test]
    fn valid_params_are_used() {
        assert_eq!(
            Pagination::from_params(Some("25"), Some("50")),
            Pagination {
                limit: 25,
                offset: 50
            }
        );
    }

    #[test]
    fn zero_and_negative_limit_use_default_not_unbounded() {
        assert_eq!(Pagination::from_params(Some("0"), None).limit, DEFAULT_LIMIT);
        assert_eq!(Pagination::from_params(Some("-5"), None).limit, DEFAULT_LIMIT);
    }

    #[test]
    fn non_numeric_params_use_defaults() {
        assert_eq!(
            Pagination::from_params(Some("ten"), Some("1.5")),
            Pagination::default()
        );
    }

    #[test]
    fn negative_offset_uses_default() {
        assert_eq!(Pagination::from_params(None, Some("-1")).offset, 0);
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(
            Pagination::from_params(Some("100000"), None).limit,
            MAX_LIMIT
        );
    }
}

#[cfg(test)]
mod in_memory_tests {
    use time::{Duration, OffsetDateTime, macros::datetime};

    use crate::{
        transaction::{Transaction, TransactionType},
        user::UserID,
    };

    use super::{Pagination, SortOrder, TransactionQuery};

    fn transaction(
        id: i64,
        owner: i64,
        amount: f64,
        category: &str,
        description: &str,
        created_at: OffsetDateTime,
    ) -> Transaction {
        Transaction {
            id,
            user_id: UserID::new(owner),
            amount,
            kind: TransactionType::Expense,
            category: category.to_owned(),
            description: description.to_owned(),
            note: String::new(),
            created_at,
            updated_at: created_at,
        }
    }

    fn fixtures() -> Vec<Transaction> {
        let start = datetime!(2025-03-01 09:00:00 UTC);

        vec![
            transaction(1, 1, 4.5, "food", "Coffee beans", start),
            transaction(2, 1, 120.0, "rent", "March rent", start + Duration::days(1)),
            transaction(3, 2, 9.0, "food", "Coffee with Bob", start + Duration::days(2)),
            transaction(4, 1, 30.0, "food", "Groceries", start + Duration::days(3)),
            transaction(5, 1, 30.0, "travel", "Bus pass", start + Duration::days(3)),
        ]
    }

    fn ids(transactions: Vec<&Transaction>) -> Vec<i64> {
        transactions.iter().map(|transaction| transaction.id).collect()
    }

    #[test]
    fn only_returns_owners_transactions() {
        let transactions = fixtures();
        let query = TransactionQuery::build(UserID::new(1), "", &[], "", Pagination::default());

        assert_eq!(ids(query.apply(&transactions)), vec![5, 4, 2, 1]);
    }

    #[test]
    fn search_ignores_case_and_respects_owner() {
        let transactions = fixtures();
        let query =
            TransactionQuery::build(UserID::new(1), "COFFEE", &[], "", Pagination::default());

        assert_eq!(ids(query.apply(&transactions)), vec![1]);
    }

    #[test]
    fn search_matches_category_and_type() {
        let transactions = fixtures();

        let by_category =
            TransactionQuery::build(UserID::new(1), "trav", &[], "", Pagination::default());
        let by_type =
            TransactionQuery::build(UserID::new(1), "expense", &[], "", Pagination::default());

        assert_eq!(ids(by_category.apply(&transactions)), vec![5]);
        assert_eq!(ids(by_type.apply(&transactions)).len(), 4);
    }

    #[test]
    fn category_filter_and_amount_sort() {
        let transactions = fixtures();
        let query = TransactionQuery::build(
            UserID::new(1),
            "",
            &["Food".to_owned(), "food".to_owned(), " ".to_owned()],
            "asc",
            Pagination::default(),
        );

        assert_eq!(query.sort, SortOrder::AmountAscending);
        assert_eq!(ids(query.apply(&transactions)), vec![1, 4]);
    }

    #[test]
    fn equal_amounts_are_ordered_by_id() {
        let transactions = fixtures();

        let ascending =
            TransactionQuery::build(UserID::new(1), "", &[], "asc", Pagination::default());
        let descending =
            TransactionQuery::build(UserID::new(1), "", &[], "desc", Pagination::default());

        assert_eq!(ids(ascending.apply(&transactions)), vec![1, 4, 5, 2]);
        assert_eq!(ids(descending.apply(&transactions)), vec![2, 5, 4, 1]);
    }

    #[test]
    fn oldest_first_and_pagination() {
        let transactions = fixtures();
        let query = TransactionQuery::build(
            UserID::new(1),
            "",
            &[],
            "oldest",
            Pagination {
                limit: 2,
                offset: 1,
            },
        );

        assert_eq!(ids(query.apply(&transactions)), vec![2, 4]);
    }
}
