//! Binding of `$orderby`, `$select` and `$expand`.

use crate::catalog::NavigationProperty;
use crate::error::{BindingError, BindingErrorKind, Result};
use crate::parser::{ExpandTermToken, ExpandToken, LevelsToken, OrderByToken, PathSegment, SelectItemToken};
use crate::types::{TypeId, TypeRef};

use super::expression::{mismatch, unknown_property, Binder};
use super::semantic::{ExpandedItem, OrderByClause, SelectExpandClause, SelectItem, SelectSegment};

impl Binder<'_> {
    pub(crate) fn bind_order_by(&mut self, items: &[OrderByToken]) -> Result<Vec<OrderByClause>> {
        items
            .iter()
            .map(|item| {
                let expression = self.bind_expression(&item.expression)?;
                if !expression.type_ref().is_single_scalar() {
                    return Err(mismatch(
                        &item.expression,
                        format!(
                            "$orderby needs a single primitive value, found {}",
                            self.model.type_name(expression.type_ref())
                        ),
                    ));
                }
                Ok(OrderByClause {
                    expression,
                    direction: item.direction,
                })
            })
            .collect()
    }

    /// Binds `$select` and `$expand` of the top level, against the type of `$it`.
    pub(crate) fn bind_select_expand(
        &mut self,
        element_type: &TypeRef,
        select: Option<&[SelectItemToken]>,
        expand: Option<&ExpandToken>,
    ) -> Result<SelectExpandClause> {
        self.bind_select_expand_at(element_type, select, expand, 1)
    }

    /// `depth` is the expand level of the items in `expand`, counted from 1.
    fn bind_select_expand_at(
        &mut self,
        element_type: &TypeRef,
        select: Option<&[SelectItemToken]>,
        expand: Option<&ExpandToken>,
        depth: usize,
    ) -> Result<SelectExpandClause> {
        let select = select
            .unwrap_or_default()
            .iter()
            .map(|item| self.bind_select_item(element_type, item))
            .collect::<Result<Vec<_>>>()?;
        let mut expanded = Vec::new();
        if let Some(expand) = expand {
            for term in &expand.terms {
                expanded.extend(self.bind_expand_term(element_type, term, depth)?);
            }
        }
        Ok(SelectExpandClause {
            select,
            expand: expanded,
        })
    }

    fn bind_select_item(&self, element_type: &TypeRef, item: &SelectItemToken) -> Result<SelectItem> {
        let path = match item {
            SelectItemToken::Star => return Ok(SelectItem::All),
            SelectItemToken::NamespaceWildcard(namespace) => {
                return Ok(SelectItem::NamespaceWildcard(namespace.clone()))
            }
            SelectItemToken::Path(path) => path,
        };
        let mut current = element_type.clone();
        let mut segments = Vec::new();
        for segment in path.iter() {
            let identifier = segment.identifier();
            if matches!(segment, PathSegment::System { .. }) {
                return Err(unknown_property(item, format!("'{identifier}' cannot be selected")));
            }
            if let Some(last) = segments.last() {
                if matches!(last, SelectSegment::Navigation { .. } | SelectSegment::Operation { .. }) {
                    return Err(unknown_property(
                        item,
                        format!("nothing can follow '{}' in $select", SelectSegment::name(last)),
                    ));
                }
            }
            let step = self.select_step(&current, identifier, item)?;
            current = match &step {
                SelectSegment::Property { type_ref, .. } | SelectSegment::TypeCast { type_ref, .. } => {
                    type_ref.element_type().unwrap_or(type_ref).clone()
                }
                SelectSegment::Navigation { type_ref, .. } => type_ref.clone(),
                SelectSegment::Operation { .. } | SelectSegment::OpenProperty { .. } => TypeRef::untyped(),
            };
            segments.push(step);
        }
        Ok(SelectItem::Path(segments))
    }

    /// One member step of a select or expand path from a value of `current`.
    fn select_step(&self, current: &TypeRef, identifier: &str, item: &dyn std::fmt::Display) -> Result<SelectSegment> {
        if current.is_untyped() {
            return Ok(SelectSegment::OpenProperty {
                name: identifier.to_string(),
            });
        }
        let Some(type_id) = current.structured_id() else {
            return Err(unknown_property(
                item,
                format!("{} has no member '{identifier}'", self.model.type_name(current)),
            ));
        };
        if identifier.contains('.') {
            if let Some(target) = self.model.find_structured_type(identifier) {
                if target.id != type_id && !self.model.is_derived_from(target.id, type_id) {
                    return Err(mismatch(
                        item,
                        format!("'{identifier}' is not derived from {}", self.model.type_name(current)),
                    ));
                }
                return Ok(SelectSegment::TypeCast {
                    name: identifier.to_string(),
                    type_ref: target.type_ref(current.nullable),
                });
            }
            if !self.model.find_operations(identifier, Some(current)).is_empty() {
                return Ok(SelectSegment::Operation {
                    name: identifier.to_string(),
                });
            }
        }
        if let Some(property) = self.model.find_property(type_id, identifier) {
            return Ok(SelectSegment::Property {
                name: property.name.clone(),
                type_ref: property.type_ref.clone(),
            });
        }
        if let Some(navigation) = self.model.find_navigation_property(type_id, identifier) {
            return Ok(SelectSegment::Navigation {
                name: navigation.name.clone(),
                type_ref: navigation.type_ref(),
            });
        }
        if self.model.is_open_type(type_id) {
            return Ok(SelectSegment::OpenProperty {
                name: identifier.to_string(),
            });
        }
        Err(unknown_property(
            item,
            format!("{} has no member '{identifier}'", self.model.type_name(current)),
        ))
    }

    fn bind_expand_term(&mut self, element_type: &TypeRef, term: &ExpandTermToken, depth: usize) -> Result<Vec<ExpandedItem>> {
        if term.path.identifier() == "*" {
            return self.bind_expand_wildcard(element_type, term, depth);
        }
        let mut current = element_type.clone();
        let mut path = Vec::new();
        let mut navigation: Option<&NavigationProperty> = None;
        let mut is_ref = false;
        for segment in term.path.iter() {
            if let PathSegment::System { identifier } = segment {
                if identifier != "$ref" || navigation.is_none() {
                    return Err(invalid_option(term, format!("'{identifier}' is not valid here")));
                }
                is_ref = true;
                break;
            }
            let identifier = segment.identifier();
            if let Some(nav) = navigation {
                // Only a type cast may follow the navigation property.
                let step = self.select_step(&current, identifier, term)?;
                let SelectSegment::TypeCast { type_ref, .. } = &step else {
                    return Err(invalid_option(
                        term,
                        format!("'{identifier}' cannot follow navigation property '{}'", nav.name),
                    ));
                };
                current = type_ref.clone();
                path.push(step);
                continue;
            }
            let step = self.select_step(&current, identifier, term)?;
            match &step {
                SelectSegment::Navigation { .. } => {
                    let type_id = current
                        .structured_id()
                        .ok_or_else(|| invalid_option(term, "navigation on a non-structured value"))?;
                    let nav = self
                        .model
                        .find_navigation_property(type_id, identifier)
                        .ok_or_else(|| unknown_property(term, format!("no navigation property '{identifier}'")))?;
                    current = TypeRef::entity(nav.target, nav.nullable);
                    navigation = Some(nav);
                }
                SelectSegment::Property { type_ref, .. } if type_ref.structured_id().is_some() => {
                    current = type_ref.clone();
                }
                SelectSegment::TypeCast { type_ref, .. } => current = type_ref.clone(),
                _ => {
                    return Err(invalid_option(
                        term,
                        format!("'{identifier}' is not a navigation property"),
                    ))
                }
            }
            path.push(step);
        }
        let Some(navigation) = navigation else {
            return Err(invalid_option(term, "$expand path must end at a navigation property"));
        };
        let target = current.structured_id().unwrap_or(navigation.target);
        let item = self.bind_expanded(term, navigation, target, path, is_ref, depth)?;
        Ok(vec![item])
    }

    /// `*` and `*/$ref`: every navigation property of the current type.
    fn bind_expand_wildcard(&mut self, element_type: &TypeRef, term: &ExpandTermToken, depth: usize) -> Result<Vec<ExpandedItem>> {
        let is_ref = term.path.next().is_some_and(|next| next.identifier() == "$ref");
        let only_levels = term.filter.is_none()
            && term.order_by.is_empty()
            && term.top.is_none()
            && term.skip.is_none()
            && term.count.is_none()
            && term.search.is_none()
            && term.select.is_none()
            && term.expand.is_none();
        if !only_levels {
            return Err(invalid_option(term, "'*' allows no options other than $levels"));
        }
        let Some(type_id) = element_type.structured_id() else {
            return Err(invalid_option(
                term,
                format!("'*' needs a structured type, found {}", self.model.type_name(element_type)),
            ));
        };
        let navigations: Vec<&NavigationProperty> = self.model.navigation_properties(type_id);
        let mut items = Vec::with_capacity(navigations.len());
        for navigation in navigations {
            let path = vec![SelectSegment::Navigation {
                name: navigation.name.clone(),
                type_ref: navigation.type_ref(),
            }];
            // `$levels` on `*` applies to the recursive navigations only.
            let levels_allowed = navigation.contains_target && navigation.is_recursive_in(self.model);
            let mut navigation_term = ExpandTermToken::new(PathSegment::member(navigation.name.clone(), None));
            if levels_allowed {
                navigation_term.levels = term.levels;
            }
            items.push(self.bind_expanded(&navigation_term, navigation, navigation.target, path, is_ref, depth)?);
        }
        Ok(items)
    }

    /// Validates the options of one expanded navigation and binds them with
    /// `$it` set to the navigation target.
    fn bind_expanded(
        &mut self,
        term: &ExpandTermToken,
        navigation: &NavigationProperty,
        target: TypeId,
        path: Vec<SelectSegment>,
        is_ref: bool,
        depth: usize,
    ) -> Result<ExpandedItem> {
        if !navigation.is_collection {
            let collection_only = [
                ("$filter", term.filter.is_some()),
                ("$orderby", !term.order_by.is_empty()),
                ("$top", term.top.is_some()),
                ("$skip", term.skip.is_some()),
                ("$count", term.count.is_some()),
            ];
            if let Some((option, _)) = collection_only.iter().find(|(_, present)| *present) {
                return Err(invalid_option(
                    term,
                    format!("{option} needs a collection-valued navigation, '{}' is single-valued", navigation.name),
                ));
            }
        }
        if term.levels.is_some() && !(navigation.contains_target && navigation.is_recursive_in(self.model)) {
            return Err(invalid_option(
                term,
                format!("$levels needs a recursive containment navigation, '{}' is not one", navigation.name),
            ));
        }
        if is_ref && (term.select.is_some() || term.expand.is_some() || term.levels.is_some()) {
            return Err(invalid_option(term, "$ref allows no $select, $expand or $levels"));
        }

        let max = self.config.max_expand_depth;
        let reached = match term.levels {
            Some(LevelsToken::Finite(levels)) => depth + (levels as usize).saturating_sub(1),
            Some(LevelsToken::Max) => depth.max(max),
            None => depth,
        };
        if reached > max {
            return Err(BindingError::new(
                BindingErrorKind::MaxExpandDepthExceeded,
                term,
                format!("$expand reaches depth {reached}, the limit is {max}"),
            )
            .into());
        }

        let element = TypeRef::entity(target, false);
        let type_ref = if navigation.is_collection {
            TypeRef::collection(element.clone())
        } else {
            element.with_nullable(navigation.nullable)
        };
        let (filter, order_by, select_expand) = self.with_implicit(element.clone(), |binder| {
            let filter = term
                .filter
                .as_ref()
                .map(|filter| binder.bind_predicate(filter))
                .transpose()?;
            let order_by = binder.bind_order_by(&term.order_by)?;
            let select_expand = binder.bind_select_expand_at(
                &element,
                term.select.as_deref(),
                term.expand.as_ref(),
                reached + 1,
            )?;
            Ok((filter, order_by, select_expand))
        })?;

        Ok(ExpandedItem {
            path,
            navigation: navigation.name.clone(),
            type_ref,
            is_ref,
            filter,
            order_by,
            top: term.top,
            skip: term.skip,
            count: term.count,
            levels: term.levels,
            search: term.search.clone(),
            select_expand,
        })
    }
}

fn invalid_option(term: &ExpandTermToken, message: impl Into<String>) -> crate::error::QueryError {
    BindingError::new(BindingErrorKind::InvalidExpandOption, term, message).into()
}
