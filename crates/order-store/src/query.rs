//! Order listing queries.

use common::{OrderId, UserId};

use crate::order::Order;
use crate::status::OrderStatus;

/// A filtered, sorted listing query over order records.
///
/// All filters are conjunctive. Results are always sorted by id ascending
/// with deleted orders last, matching the command layer's autocomplete
/// ordering.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Match orders whose id starts with, or whose text contains, this
    /// fragment. An empty fragment matches everything.
    pub fragment: Option<String>,

    /// Restrict to a single status.
    pub status: Option<OrderStatus>,

    /// Restrict to orders claimed by this chef.
    pub chef: Option<UserId>,

    /// Restrict to orders assigned to this deliverer.
    pub deliverer: Option<UserId>,

    /// Restrict to orders placed by this customer.
    pub customer: Option<UserId>,

    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Creates an empty query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Filters on an id-prefix / text-substring fragment.
    pub fn fragment(mut self, fragment: impl Into<String>) -> Self {
        self.fragment = Some(fragment.into());
        self
    }

    /// Filters on status.
    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Filters on the claiming chef.
    pub fn chef(mut self, chef: UserId) -> Self {
        self.chef = Some(chef);
        self
    }

    /// Filters on the assigned deliverer.
    pub fn deliverer(mut self, deliverer: UserId) -> Self {
        self.deliverer = Some(deliverer);
        self
    }

    /// Filters on the customer.
    pub fn customer(mut self, customer: UserId) -> Self {
        self.customer = Some(customer);
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the record passes every filter.
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(ref fragment) = self.fragment
            && !fragment.is_empty()
            && !order.id.as_str().starts_with(fragment.as_str())
            && !order.order_text.contains(fragment.as_str())
        {
            return false;
        }
        if let Some(status) = self.status
            && order.status != status
        {
            return false;
        }
        if let Some(ref chef) = self.chef
            && order.chef.as_ref() != Some(chef)
        {
            return false;
        }
        if let Some(ref deliverer) = self.deliverer
            && order.deliverer.as_ref() != Some(deliverer)
        {
            return false;
        }
        if let Some(ref customer) = self.customer
            && &order.customer != customer
        {
            return false;
        }
        true
    }

    /// Sort key: id ascending, deleted orders after everything else.
    pub fn sort_key(order: &Order) -> (bool, OrderId) {
        (order.status == OrderStatus::Deleted, order.id.clone())
    }
}
