//! Integration tests for the full request workflow: resource path, query
//! options and alias substitution through `UriQueryParser`.

mod common;

use common::{context, sales_model};
use odata_query::error::{BindingErrorKind, QueryError};
use odata_query::parser::{BinaryOperatorKind, LevelsToken, OrderDirection};
use odata_query::{
    Catalog, ODataSegmentKind, ParserConfig, PrimitiveKind, PrimitiveValue, ProtocolVersion, SelectItem,
    SelectSegment, SemanticNode, UriQueryParser,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn kinds(parser: &UriQueryParser<'_>, text: &str) -> Vec<ODataSegmentKind> {
    parser
        .parse_path(text)
        .unwrap_or_else(|err| panic!("{text}: {err}"))
        .segments
        .into_iter()
        .map(|segment| segment.kind)
        .collect()
}

fn binding_kind(result: odata_query::Result<impl std::fmt::Debug>) -> BindingErrorKind {
    match result {
        Err(QueryError::Binding(err)) => err.kind,
        other => panic!("expected binding error, got {other:?}"),
    }
}

fn has_alias(node: &SemanticNode) -> bool {
    let mut found = false;
    let _ = node.clone().transform(&mut |node| {
        if matches!(node, SemanticNode::ParameterAlias { .. }) {
            found = true;
        }
        Ok(node)
    });
    found
}

// =============================================================================
// Resource Path Tests
// =============================================================================

mod path_integration {
    use super::*;

    #[test]
    fn test_entity_set_and_key() {
        init_tracing();
        let model = sales_model();
        let parser = UriQueryParser::new(&model);

        let path = parser.parse_path("Products(5)").unwrap();
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[0].kind, ODataSegmentKind::EntitySet("Products".into()));
        let ODataSegmentKind::Key(values) = &path.segments[1].kind else {
            panic!("expected key segment");
        };
        assert_eq!(values[0].name, "ID");
        assert_eq!(values[0].value.as_constant(), Some(&PrimitiveValue::Int32(5)));
        let target = path.target_type().unwrap();
        assert!(target.element_type().is_none());
        assert_eq!(path.navigation_source(), Some("Products"));
    }

    #[test]
    fn test_string_key_and_navigation() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);

        let path = parser.parse_path("Customers('ALFKI')/Orders").unwrap();
        assert!(matches!(path.segments[1].kind, ODataSegmentKind::Key(_)));
        assert_eq!(path.segments[2].kind, ODataSegmentKind::Navigation("Orders".into()));
        assert!(path.target_type().unwrap().is_collection());
        assert_eq!(path.implicit_type(), Some(&common::entity(&model, "Sales.Order")));
    }

    #[test]
    fn test_composite_key_converts_each_value() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);

        let path = parser.parse_path("OrderLines(OrderID=1,Line=2)").unwrap();
        let ODataSegmentKind::Key(values) = &path.segments[1].kind else {
            panic!("expected key segment");
        };
        assert_eq!(values.len(), 2);
        let line = values.iter().find(|v| v.name == "Line").unwrap();
        assert_eq!(line.value.as_constant(), Some(&PrimitiveValue::Int16(2)));
    }

    #[test]
    fn test_incomplete_composite_key_is_rejected() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        assert_eq!(
            binding_kind(parser.parse_path("OrderLines(OrderID=1)")),
            BindingErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_type_cast_then_property() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let segments = kinds(&parser, "Customers('A')/Sales.VipCustomer/Level");
        assert_eq!(segments[2], ODataSegmentKind::TypeCast("Sales.VipCustomer".into()));
        assert_eq!(segments[3], ODataSegmentKind::Property("Level".into()));
    }

    #[test]
    fn test_system_segments() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);

        let count = parser.parse_path("Products/$count").unwrap();
        assert_eq!(count.segments[1].kind, ODataSegmentKind::Count);
        assert_eq!(count.target_type().unwrap().as_primitive(), Some(PrimitiveKind::Int64));

        let value = kinds(&parser, "Products(1)/Name/$value");
        assert_eq!(value.last(), Some(&ODataSegmentKind::Value));

        let reference = kinds(&parser, "Customers('A')/Orders/$ref");
        assert_eq!(reference.last(), Some(&ODataSegmentKind::Ref));
    }

    #[test]
    fn test_singleton_navigation_chain() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let segments = kinds(&parser, "Me/Orders(3)/Items");
        assert_eq!(segments[0], ODataSegmentKind::Singleton("Me".into()));
        assert_eq!(segments[1], ODataSegmentKind::Navigation("Orders".into()));
        assert!(matches!(segments[2], ODataSegmentKind::Key(_)));
        assert_eq!(segments[3], ODataSegmentKind::Navigation("Items".into()));
    }

    #[test]
    fn test_operations_in_path() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);

        let top = parser.parse_path("TopProducts()").unwrap();
        assert!(matches!(top.segments[0].kind, ODataSegmentKind::Operation { .. }));
        assert!(top.target_type().unwrap().is_collection());

        let ship = kinds(&parser, "Orders(1)/Sales.Ship");
        assert!(matches!(ship.last(), Some(ODataSegmentKind::Operation { .. })));
    }

    #[test]
    fn test_open_type_member() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let segments = kinds(&parser, "Documents(1)/Anything");
        assert_eq!(segments[2], ODataSegmentKind::OpenProperty("Anything".into()));
    }

    #[test]
    fn test_path_errors() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        assert_eq!(binding_kind(parser.parse_path("Nope")), BindingErrorKind::UnknownProperty);
        assert_eq!(binding_kind(parser.parse_path("Products/Name")), BindingErrorKind::TypeMismatch);
        assert_eq!(binding_kind(parser.parse_path("Me('A')")), BindingErrorKind::TypeMismatch);
        assert_eq!(binding_kind(parser.parse_path("Products(1)/Nope")), BindingErrorKind::UnknownProperty);
        assert_eq!(
            binding_kind(parser.parse_path("Products('not-an-int')")),
            BindingErrorKind::TypeMismatch
        );
    }
}

// =============================================================================
// Filter Binding Tests
// =============================================================================

mod filter_integration {
    use super::*;

    fn filter(model: &Catalog, set: &str, text: &str) -> SemanticNode {
        UriQueryParser::new(model)
            .parse_filter(text, &context(model, set))
            .unwrap_or_else(|err| panic!("{text}: {err}"))
    }

    fn filter_err(model: &Catalog, set: &str, text: &str) -> BindingErrorKind {
        binding_kind(UriQueryParser::new(model).parse_filter(text, &context(model, set)))
    }

    #[test]
    fn test_builtin_functions() {
        let model = sales_model();

        let node = filter(&model, "Customers", "contains(Name,'a')");
        let SemanticNode::FunctionCall { name, type_ref, .. } = &node else {
            panic!("expected function call");
        };
        assert_eq!(name, "contains");
        assert_eq!(type_ref.as_primitive(), Some(PrimitiveKind::Boolean));

        let node = filter(&model, "Products", "round(Price) eq 2");
        let SemanticNode::BinaryOperator { left, .. } = &node else {
            panic!("expected comparison");
        };
        assert_eq!(left.primitive_kind(), Some(PrimitiveKind::Decimal));

        filter(&model, "Products", "year(Released) eq 2024");
        filter(&model, "Customers", "length(Name) gt 3 and startswith(Name,'A')");
        filter(&model, "Customers", "substring(Name,1) eq 'x'");
    }

    #[test]
    fn test_builtin_case_sensitivity_is_configurable() {
        let model = sales_model();
        let ctx = context(&model, "Customers");
        let strict = UriQueryParser::new(&model);
        assert_eq!(
            binding_kind(strict.parse_filter("Contains(Name,'a')", &ctx)),
            BindingErrorKind::UnknownOperation
        );

        let config = ParserConfig::default().with_case_insensitive_builtins(true);
        let relaxed = UriQueryParser::with_config(&model, &config);
        let node = relaxed.parse_filter("Contains(Name,'a')", &ctx).unwrap();
        assert!(matches!(node, SemanticNode::FunctionCall { ref name, .. } if name == "contains"));
    }

    #[test]
    fn test_type_functions() {
        let model = sales_model();

        let node = filter(&model, "Customers", "isof(Sales.VipCustomer)");
        assert_eq!(node.primitive_kind(), Some(PrimitiveKind::Boolean));

        let node = filter(&model, "Products", "cast(Price, Edm.Double) gt 1");
        let SemanticNode::BinaryOperator { left, .. } = &node else {
            panic!("expected comparison");
        };
        assert_eq!(left.primitive_kind(), Some(PrimitiveKind::Double));
        assert!(left.type_ref().nullable);
    }

    #[test]
    fn test_derived_type_cast_in_filter() {
        let model = sales_model();
        filter(&model, "Customers", "Sales.VipCustomer/Level gt 1");
        filter(&model, "Customers", "BestFriend/Sales.VipCustomer/Level gt 1");
        assert_eq!(
            filter_err(&model, "Customers", "Sales.Order/Amount gt 1"),
            BindingErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_enum_comparisons() {
        let model = sales_model();

        let node = filter(&model, "Products", "Color eq 'Red'");
        let SemanticNode::BinaryOperator { right, .. } = &node else {
            panic!("expected comparison");
        };
        assert!(matches!(
            right.as_constant(),
            Some(PrimitiveValue::Enum { member, .. }) if member == "Red"
        ));

        filter(&model, "Products", "Color has Sales.Color'Green'");
        assert_eq!(
            filter_err(&model, "Products", "Color eq 'Purple'"),
            BindingErrorKind::InvalidLiteral
        );
    }

    #[test]
    fn test_in_operator() {
        let model = sales_model();
        let node = filter(&model, "Customers", "Name in ('a','b')");
        assert!(matches!(node, SemanticNode::In { ref items, .. } if items.len() == 2));
        assert_eq!(
            filter_err(&model, "Products", "ID in (1,'x')"),
            BindingErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_numeric_promotion_wraps_in_convert() {
        let model = sales_model();
        let node = filter(&model, "Products", "ID add 1.5 gt 2");
        let SemanticNode::BinaryOperator { left, .. } = &node else {
            panic!("expected comparison");
        };
        let SemanticNode::BinaryOperator { op, left: id, type_ref, .. } = left.as_ref() else {
            panic!("expected addition");
        };
        assert_eq!(*op, BinaryOperatorKind::Add);
        assert_eq!(type_ref.as_primitive(), Some(PrimitiveKind::Decimal));
        assert!(matches!(id.as_ref(), SemanticNode::Convert { .. }));

        assert_eq!(
            filter_err(&model, "Products", "Weight gt Price"),
            BindingErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_temporal_arithmetic() {
        let model = sales_model();
        filter(&model, "Orders", "Placed sub 2024-01-01T00:00:00Z gt duration'P1D'");
        filter(&model, "Orders", "Placed add duration'PT1H' lt now()");
    }

    #[test]
    fn test_count_segment_in_filter() {
        let model = sales_model();
        let node = filter(&model, "Customers", "Orders/$count gt 2");
        let SemanticNode::BinaryOperator { left, .. } = &node else {
            panic!("expected comparison");
        };
        assert!(matches!(left.as_ref(), SemanticNode::Count { .. }));
        assert_eq!(
            filter_err(&model, "Customers", "Name/$count gt 2"),
            BindingErrorKind::TypeMismatch
        );
    }

    #[test]
    fn test_nested_lambdas() {
        let model = sales_model();
        let node = filter(
            &model,
            "Customers",
            "Orders/any(o:o/Items/all(i:i/Quantity gt 0 and i/Product/Price lt o/Amount))",
        );
        assert!(matches!(node, SemanticNode::Any(_)));
    }
}

// =============================================================================
// Order By, Select and Expand Tests
// =============================================================================

mod options_integration {
    use super::*;

    #[test]
    fn test_orderby_directions() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let clauses = parser
            .parse_orderby("Name, Address/City desc", &context(&model, "Customers"))
            .unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].direction, OrderDirection::Ascending);
        assert_eq!(clauses[1].direction, OrderDirection::Descending);
    }

    #[test]
    fn test_orderby_rejects_non_scalar() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let ctx = context(&model, "Customers");
        assert_eq!(binding_kind(parser.parse_orderby("Orders", &ctx)), BindingErrorKind::TypeMismatch);
        assert_eq!(binding_kind(parser.parse_orderby("Address", &ctx)), BindingErrorKind::TypeMismatch);
    }

    #[test]
    fn test_select_and_nested_expand() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let clause = parser
            .parse_select_and_expand(
                Some("Name,Address/City"),
                Some("Orders($select=Amount;$expand=Items($filter=Quantity gt 1))"),
                &context(&model, "Customers"),
            )
            .unwrap();

        assert_eq!(clause.select.len(), 2);
        let SelectItem::Path(segments) = &clause.select[1] else {
            panic!("expected select path");
        };
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].name(), "City");
        assert!(!clause.all_selected());

        let orders = &clause.expand[0];
        assert_eq!(orders.navigation, "Orders");
        assert!(orders.type_ref.is_collection());
        assert_eq!(orders.select_expand.select.len(), 1);
        let items = &orders.select_expand.expand[0];
        assert_eq!(items.navigation, "Items");
        assert!(items.filter.is_some());
    }

    #[test]
    fn test_select_wildcards() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let ctx = context(&model, "Products");
        let clause = parser.parse_select_and_expand(Some("*"), None, &ctx).unwrap();
        assert_eq!(clause.select, vec![SelectItem::All]);
        assert!(clause.all_selected());

        let clause = parser.parse_select_and_expand(Some("Sales.*"), None, &ctx).unwrap();
        assert_eq!(clause.select, vec![SelectItem::NamespaceWildcard("Sales".into())]);

        assert_eq!(
            binding_kind(parser.parse_select_and_expand(Some("Nope"), None, &ctx)),
            BindingErrorKind::UnknownProperty
        );
    }

    #[test]
    fn test_expand_all_navigations() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let ctx = context(&model, "Customers");

        let clause = parser.parse_select_and_expand(None, Some("*"), &ctx).unwrap();
        let mut names: Vec<&str> = clause.expand.iter().map(|item| item.navigation.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["BestFriend", "Orders"]);
        assert!(clause.expand.iter().all(|item| !item.is_ref));

        let clause = parser.parse_select_and_expand(None, Some("*/$ref"), &ctx).unwrap();
        assert!(clause.expand.iter().all(|item| item.is_ref));

        let clause = parser.parse_select_and_expand(None, Some("Orders/$ref"), &ctx).unwrap();
        assert!(clause.expand[0].is_ref);
    }

    #[test]
    fn test_expand_through_derived_type() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let clause = parser
            .parse_select_and_expand(None, Some("BestFriend/Sales.VipCustomer"), &context(&model, "Customers"))
            .unwrap();
        let item = &clause.expand[0];
        assert_eq!(item.path.len(), 2);
        assert!(matches!(item.path[1], SelectSegment::TypeCast { .. }));
    }

    #[test]
    fn test_expand_levels_on_recursive_containment() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let ctx = context(&model, "Employees");

        let clause = parser
            .parse_select_and_expand(None, Some("Reports($levels=3)"), &ctx)
            .unwrap();
        assert_eq!(clause.expand[0].levels, Some(LevelsToken::Finite(3)));

        let clause = parser
            .parse_select_and_expand(None, Some("Reports($levels=max)"), &ctx)
            .unwrap();
        assert_eq!(clause.expand[0].levels, Some(LevelsToken::Max));

        assert_eq!(
            binding_kind(parser.parse_select_and_expand(None, Some("Reports($levels=12)"), &ctx)),
            BindingErrorKind::MaxExpandDepthExceeded
        );
    }

    #[test]
    fn test_expand_levels_rejected_elsewhere() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let ctx = context(&model, "Customers");
        assert_eq!(
            binding_kind(parser.parse_select_and_expand(None, Some("Orders($levels=2)"), &ctx)),
            BindingErrorKind::InvalidExpandOption
        );
        assert_eq!(
            binding_kind(parser.parse_select_and_expand(None, Some("BestFriend($levels=2)"), &ctx)),
            BindingErrorKind::InvalidExpandOption
        );
        assert_eq!(
            binding_kind(parser.parse_select_and_expand(None, Some("Name"), &ctx)),
            BindingErrorKind::InvalidExpandOption
        );
    }

    #[test]
    fn test_expand_all_needs_structured_target() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        assert_eq!(
            binding_kind(parser.parse_uri("Products(1)/Name?$expand=*")),
            BindingErrorKind::InvalidExpandOption
        );
    }

    #[test]
    fn test_search_passes_through() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let search = parser.parse_search("blue OR green").unwrap();
        assert_eq!(search.to_string(), "blue OR green");
    }
}

// =============================================================================
// Full Request Tests
// =============================================================================

mod request_integration {
    use super::*;

    #[test]
    fn test_full_request() {
        init_tracing();
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser
            .parse_uri(
                "Customers('A')/Orders?$filter=Amount gt 10&$orderby=Placed desc\
                 &$select=Amount&$expand=Items&$top=5&$skip=10&$count=true&$format=json&mode=fast",
            )
            .unwrap();

        assert_eq!(query.path.segments.len(), 3);
        assert!(query.filter.is_some());
        assert_eq!(query.order_by.len(), 1);
        let select_expand = query.select_expand.as_ref().unwrap();
        assert_eq!(select_expand.expand[0].navigation, "Items");
        assert_eq!(query.top, Some(5));
        assert_eq!(query.skip, Some(10));
        assert_eq!(query.count, Some(true));
        assert_eq!(query.format.as_deref(), Some("json"));
        assert_eq!(query.custom.len(), 1);
        assert!(query.aliases.is_empty());
    }

    #[test]
    fn test_options_bind_against_path_target() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        // `Quantity` only exists on OrderItem, the element type of the path.
        parser.parse_uri("Orders(1)/Items?$filter=Quantity gt 1").unwrap();
        assert_eq!(
            binding_kind(parser.parse_uri("Orders?$filter=Quantity gt 1")),
            BindingErrorKind::UnknownProperty
        );
    }

    #[test]
    fn test_query_without_options() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser.parse_uri("Products").unwrap();
        assert!(query.filter.is_none());
        assert!(query.select_expand.is_none());
        assert!(query.order_by.is_empty());
    }

    #[test]
    fn test_alias_declared_and_resolved() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser
            .parse_uri("Products?$filter=Price gt @p and Name eq @n&@p=10&@n='widget'")
            .unwrap();
        assert_eq!(query.aliases.len(), 2);
        assert_eq!(query.aliases.get("n"), Some("'widget'"));
        assert!(has_alias(query.filter.as_ref().unwrap()));

        let resolved = query.resolve_aliases(ProtocolVersion::V4).unwrap();
        assert!(!has_alias(resolved.filter.as_ref().unwrap()));
    }

    #[test]
    fn test_alias_in_orderby_is_resolved() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser
            .parse_uri("Products?$orderby=Price add @bump&@bump=1")
            .unwrap();
        let resolved = query.resolve_aliases(ProtocolVersion::V4).unwrap();
        assert!(!has_alias(&resolved.order_by[0].expression));
    }

    #[test]
    fn test_undeclared_alias_fails_binding() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        assert_eq!(
            binding_kind(parser.parse_uri("Products?$filter=Price gt @p")),
            BindingErrorKind::UnboundAlias
        );
    }

    #[test]
    fn test_alias_with_expression_value_fails_resolution() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser
            .parse_uri("Products?$filter=Price gt @p&@p=Price add 1")
            .unwrap();
        let err = query.resolve_aliases(ProtocolVersion::V4).unwrap_err();
        assert!(matches!(err, QueryError::Alias { ref name, .. } if name == "p"));
    }

    #[test]
    fn test_alias_takes_the_type_it_is_compared_with() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser.parse_uri("Products?$filter=Price gt @p&@p=5").unwrap();
        let Some(SemanticNode::BinaryOperator { right, .. }) = &query.filter else {
            panic!("expected comparison");
        };
        assert!(matches!(right.as_ref(), SemanticNode::ParameterAlias { .. }));
        assert_eq!(right.primitive_kind(), Some(PrimitiveKind::Decimal));

        let resolved = query.resolve_aliases(ProtocolVersion::V4).unwrap();
        let Some(SemanticNode::BinaryOperator { left, right, .. }) = &resolved.filter else {
            panic!("expected comparison");
        };
        assert_eq!(left.primitive_kind(), right.primitive_kind());
        assert!(matches!(right.as_constant(), Some(PrimitiveValue::Decimal(_))));
    }

    #[test]
    fn test_alias_value_of_wrong_type_fails_resolution() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser.parse_uri("Products?$filter=Price gt @p&@p='cheap'").unwrap();
        let err = query.resolve_aliases(ProtocolVersion::V4).unwrap_err();
        assert!(matches!(err, QueryError::Alias { ref name, .. } if name == "p"));
    }

    #[test]
    fn test_alias_in_path_key() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser.parse_uri("Products(@id)/Name?@id=7").unwrap();
        let ODataSegmentKind::Key(values) = &query.path.segments[1].kind else {
            panic!("expected key segment");
        };
        assert!(has_alias(&values[0].value));

        let resolved = query.resolve_aliases(ProtocolVersion::V4).unwrap();
        let ODataSegmentKind::Key(values) = &resolved.path.segments[1].kind else {
            panic!("expected key segment");
        };
        assert_eq!(values[0].value.as_constant(), Some(&PrimitiveValue::Int32(7)));

        assert_eq!(
            binding_kind(parser.parse_path("Products(@id)")),
            BindingErrorKind::UnboundAlias
        );
    }

    #[test]
    fn test_alias_in_path_operation_argument() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser
            .parse_uri("Products(1)/Sales.Discount(percent=@pct)?@pct=15")
            .unwrap();
        let resolved = query.resolve_aliases(ProtocolVersion::V4).unwrap();
        let Some(ODataSegmentKind::Operation { arguments, .. }) =
            resolved.path.segments.last().map(|segment| &segment.kind)
        else {
            panic!("expected operation segment");
        };
        assert_eq!(arguments[0].value.as_constant(), Some(&PrimitiveValue::Int32(15)));
    }

    #[test]
    fn test_alias_in_expand_options() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let query = parser
            .parse_uri("Customers?$expand=Orders($filter=Amount gt @p;$orderby=Amount add @p;$expand=Items($filter=Quantity lt @q))&@p=5&@q=3")
            .unwrap();
        let orders = &query.select_expand.as_ref().unwrap().expand[0];
        assert!(has_alias(orders.filter.as_ref().unwrap()));

        let resolved = query.resolve_aliases(ProtocolVersion::V4).unwrap();
        let orders = &resolved.select_expand.as_ref().unwrap().expand[0];
        assert!(!has_alias(orders.filter.as_ref().unwrap()));
        assert!(!has_alias(&orders.order_by[0].expression));
        let items = &orders.select_expand.expand[0];
        assert!(!has_alias(items.filter.as_ref().unwrap()));
        assert_eq!(resolved.aliases.len(), 2);
    }

    #[test]
    fn test_syntax_error_in_option_is_reported() {
        let model = sales_model();
        let parser = UriQueryParser::new(&model);
        let err = parser.parse_uri("Products?$filter=Price gt").unwrap_err();
        assert!(err.as_syntax().is_some());
    }

    #[test]
    fn test_parser_is_shared_across_threads() {
        let model = sales_model();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let parser = UriQueryParser::new(&model);
                    for _ in 0..25 {
                        let query = parser
                            .parse_uri("Customers?$filter=Orders/any(o:o/Amount gt 5)&$expand=Orders")
                            .unwrap();
                        assert!(matches!(query.filter, Some(SemanticNode::Any(_))));
                    }
                });
            }
        });
    }
}
