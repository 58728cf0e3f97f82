//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values, e.g. a
/// `Currency` code or a `Money` amount. A `Bill` is not a value object: two
/// bills with identical line items are still different bills.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
