//! Shared test fixtures: a small sales model.

#![allow(dead_code)]

use odata_query::catalog::{Catalog, NavigationProperty, Operation};
use odata_query::types::{PrimitiveKind, TypeRef};
use odata_query::{BindingContext, MetadataModel};

pub const NS: &str = "Sales";

/// Builds the sales model:
///
/// - `Product(ID)`: Name, Price, Color (flags enum), Tags, Released,
///   Supplier (single nav to Customer)
/// - `Customer(ID)`: Name, Address (complex), Orders, BestFriend
/// - `VipCustomer : Customer`: Level
/// - `Order(ID)`: Amount, Placed, Customer, Items
/// - `OrderItem(ID)`: Price, Quantity, Product
/// - `Employee(ID)`: Name, Reports (contained, recursive)
/// - `Document(ID)`: open type
/// - `OrderLine(OrderID, Line)`: composite key
pub fn sales_model() -> Catalog {
    let mut catalog = Catalog::new();

    let color = catalog
        .add_enum_type(NS, "Color", &[("Red", 1), ("Green", 2), ("Blue", 4)], true)
        .unwrap();

    let address = catalog.add_complex_type(NS, "Address", None).unwrap();
    catalog.add_property(address, "Street", string(false)).unwrap();
    catalog.add_property(address, "City", string(false)).unwrap();
    catalog.add_property(address, "Zip", string(true)).unwrap();

    let customer = catalog.add_entity_type(NS, "Customer", None).unwrap();
    let vip = catalog.add_entity_type(NS, "VipCustomer", Some(customer)).unwrap();
    let product = catalog.add_entity_type(NS, "Product", None).unwrap();
    let order = catalog.add_entity_type(NS, "Order", None).unwrap();
    let item = catalog.add_entity_type(NS, "OrderItem", None).unwrap();
    let employee = catalog.add_entity_type(NS, "Employee", None).unwrap();
    let document = catalog.add_entity_type(NS, "Document", None).unwrap();
    let line = catalog.add_entity_type(NS, "OrderLine", None).unwrap();

    catalog.add_key_property(customer, "ID", PrimitiveKind::String).unwrap();
    catalog.add_property(customer, "Name", string(false)).unwrap();
    catalog
        .add_property(customer, "Address", TypeRef::complex(address, true))
        .unwrap();
    catalog
        .add_navigation_property(customer, NavigationProperty::collection("Orders", order).with_partner("Customer"))
        .unwrap();
    catalog
        .add_navigation_property(customer, NavigationProperty::single("BestFriend", customer))
        .unwrap();
    catalog
        .add_property(vip, "Level", TypeRef::primitive(PrimitiveKind::Int32, false))
        .unwrap();

    catalog.add_key_property(product, "ID", PrimitiveKind::Int32).unwrap();
    catalog.add_property(product, "Name", string(false)).unwrap();
    catalog
        .add_property(product, "Price", TypeRef::primitive(PrimitiveKind::Decimal, false))
        .unwrap();
    catalog
        .add_property(product, "Weight", TypeRef::primitive(PrimitiveKind::Double, true))
        .unwrap();
    catalog
        .add_property(product, "Color", TypeRef::enumeration(color, true))
        .unwrap();
    catalog
        .add_property(product, "Tags", TypeRef::collection(string(false)))
        .unwrap();
    catalog
        .add_property(product, "Released", TypeRef::primitive(PrimitiveKind::Date, true))
        .unwrap();
    catalog
        .add_navigation_property(product, NavigationProperty::single("Supplier", customer).with_nullable(true))
        .unwrap();

    catalog.add_key_property(order, "ID", PrimitiveKind::Int32).unwrap();
    catalog
        .add_property(order, "Amount", TypeRef::primitive(PrimitiveKind::Decimal, false))
        .unwrap();
    catalog
        .add_property(order, "Placed", TypeRef::primitive(PrimitiveKind::DateTimeOffset, false))
        .unwrap();
    catalog
        .add_navigation_property(order, NavigationProperty::single("Customer", customer).with_partner("Orders"))
        .unwrap();
    catalog
        .add_navigation_property(order, NavigationProperty::collection("Items", item))
        .unwrap();

    catalog.add_key_property(item, "ID", PrimitiveKind::Int32).unwrap();
    catalog
        .add_property(item, "Price", TypeRef::primitive(PrimitiveKind::Decimal, false))
        .unwrap();
    catalog
        .add_property(item, "Quantity", TypeRef::primitive(PrimitiveKind::Int32, false))
        .unwrap();
    catalog
        .add_navigation_property(item, NavigationProperty::single("Product", product))
        .unwrap();

    catalog.add_key_property(employee, "ID", PrimitiveKind::Int32).unwrap();
    catalog.add_property(employee, "Name", string(false)).unwrap();
    catalog
        .add_navigation_property(employee, NavigationProperty::collection("Reports", employee).contained())
        .unwrap();

    catalog.add_key_property(document, "ID", PrimitiveKind::Int32).unwrap();
    catalog.add_property(document, "Title", string(false)).unwrap();
    catalog.set_open(document, true).unwrap();

    catalog.add_key_property(line, "OrderID", PrimitiveKind::Int32).unwrap();
    catalog.add_key_property(line, "Line", PrimitiveKind::Int16).unwrap();

    catalog.add_entity_set("Customers", customer).unwrap();
    catalog.add_entity_set("Products", product).unwrap();
    catalog.add_entity_set("Orders", order).unwrap();
    catalog.add_entity_set("Employees", employee).unwrap();
    catalog.add_entity_set("Documents", document).unwrap();
    catalog.add_entity_set("OrderLines", line).unwrap();
    catalog.add_singleton("Me", customer).unwrap();

    catalog
        .add_operation(
            Operation::function(NS, "TopProducts")
                .returns(TypeRef::collection(TypeRef::entity(product, false)))
                .composable(),
        )
        .unwrap();
    catalog
        .add_operation(
            Operation::function(NS, "Discount")
                .bound_to(TypeRef::entity(product, false))
                .parameter("percent", TypeRef::primitive(PrimitiveKind::Int32, false))
                .returns(TypeRef::primitive(PrimitiveKind::Decimal, false)),
        )
        .unwrap();
    // Two overloads that both accept an Int32 argument.
    catalog
        .add_operation(
            Operation::function(NS, "Score")
                .bound_to(TypeRef::entity(customer, false))
                .parameter("weight", TypeRef::primitive(PrimitiveKind::Int64, false))
                .returns(TypeRef::primitive(PrimitiveKind::Int32, false)),
        )
        .unwrap();
    catalog
        .add_operation(
            Operation::function(NS, "Score")
                .bound_to(TypeRef::entity(customer, false))
                .parameter("weight", TypeRef::primitive(PrimitiveKind::Double, false))
                .returns(TypeRef::primitive(PrimitiveKind::Int32, false)),
        )
        .unwrap();
    catalog
        .add_operation(Operation::action(NS, "Ship").bound_to(TypeRef::entity(order, false)))
        .unwrap();

    catalog
}

fn string(nullable: bool) -> TypeRef {
    TypeRef::primitive(PrimitiveKind::String, nullable)
}

/// Binding context for options applied to entity set `name`.
pub fn context(model: &Catalog, name: &str) -> BindingContext {
    BindingContext::for_entity_set(model, name)
}

/// Non-nullable reference to the entity type `qualified_name`.
pub fn entity(model: &Catalog, qualified_name: &str) -> TypeRef {
    let ty = model
        .find_entity_type(qualified_name)
        .unwrap_or_else(|| panic!("missing entity type {qualified_name}"));
    TypeRef::entity(ty.id, false)
}
