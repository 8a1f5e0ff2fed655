use aclkit_security::{IdValue, permission};
use sea_orm::Condition;
use sea_orm::sea_query::{ConditionExpression, SelectStatement, SimpleExpr};
use tracing::trace;

use crate::config::OwnerGroupMode;
use crate::metadata::{AclEntityMetaData, AclMetaData, OwnerData, OwnerGroupData, Relation};
use crate::secure::cond::{id_value_to_sea_expr, permission_grant_condition, qualified};
use crate::secure::error::AclError;
use crate::secure::join::{Joiner, Node};

/// OR of access paths; empty means no path.
struct Disjunction {
    cond: Condition,
    terms: usize,
}

impl Disjunction {
    fn new() -> Self {
        Self {
            cond: Condition::any(),
            terms: 0,
        }
    }

    fn push<C: Into<ConditionExpression>>(&mut self, term: C) {
        let cond = std::mem::replace(&mut self.cond, Condition::any());
        self.cond = cond.add(term);
        self.terms += 1;
    }

    fn finish(self) -> Option<Condition> {
        (self.terms > 0).then_some(self.cond)
    }
}

/// Recursive predicate builder for one statement and one principal.
pub struct Compiler<'m, 's> {
    meta: &'m AclMetaData,
    owner_groups: OwnerGroupMode,
    user_id: SimpleExpr,
    joins: Joiner<'s>,
}

impl<'m, 's> Compiler<'m, 's> {
    pub fn new(
        meta: &'m AclMetaData,
        owner_groups: OwnerGroupMode,
        user_id: &IdValue,
        stmt: &'s mut SelectStatement,
    ) -> Self {
        Self {
            meta,
            owner_groups,
            user_id: id_value_to_sea_expr(user_id),
            joins: Joiner::new(stmt),
        }
    }

    /// OR of every access path to rows of `from` for `permission`, or `None`
    /// if there is none. Parents are followed while `depth > 0`.
    ///
    /// # Errors
    /// [`AclError::UnknownEntity`] if a relation target is missing from the
    /// registry.
    pub fn compile(
        &mut self,
        from: &Node<'m>,
        permission: &str,
        depth: u32,
    ) -> Result<Option<Condition>, AclError> {
        trace!(
            entity = %from.meta.name,
            alias = %from.alias,
            permission,
            depth,
            "checking access paths"
        );

        let mut any = Disjunction::new();
        self.self_rule(from, permission, &mut any);
        self.owner_rules(from, permission, None, &mut any)?;
        self.owner_group_rules(from, permission, &mut any)?;
        self.permission_link_rules(from, permission, &mut any)?;
        if depth > 0 {
            self.parent_rules(from, permission, depth, &mut any)?;
        }

        let compiled = any.finish();
        if compiled.is_none() {
            trace!(entity = %from.meta.name, permission, "no access paths found");
        }
        Ok(compiled)
    }

    fn target(&self, relation: &Relation) -> Result<&'m AclEntityMetaData, AclError> {
        let meta = self.meta;
        meta.entity(&relation.target)
            .map(|e| &**e)
            .ok_or_else(|| AclError::UnknownEntity(relation.target.clone()))
    }

    fn user_id_eq(&self, alias: &str, column: &str) -> SimpleExpr {
        qualified(alias, column).eq(self.user_id.clone())
    }

    fn self_rule(&self, from: &Node<'m>, permission: &str, any: &mut Disjunction) {
        if self.meta.is_user_entity(&from.meta.name)
            && self.meta.self_permissions().has_permission(permission)
        {
            trace!(entity = %from.meta.name, "adding self predicate");
            any.push(self.user_id_eq(&from.alias, &from.meta.id_column));
        }
    }

    fn admits_owner(
        &self,
        owner: &OwnerData,
        permission: &str,
        via_group: Option<&OwnerGroupData>,
    ) -> bool {
        match (via_group, self.owner_groups) {
            (None, _) => owner.permissions.has_permission(permission),
            (Some(_), OwnerGroupMode::Unconditional) => true,
            (Some(group), OwnerGroupMode::Scoped) => owner
                .permissions
                .has_permission(&permission::prefixed(&group.prefix, permission)),
        }
    }

    fn owner_rules(
        &mut self,
        from: &Node<'m>,
        permission: &str,
        via_group: Option<&OwnerGroupData>,
        any: &mut Disjunction,
    ) -> Result<(), AclError> {
        for owner in &from.meta.owners {
            if !self.admits_owner(owner, permission, via_group) {
                continue;
            }
            trace!(
                entity = %from.meta.name,
                property = %owner.relation.property,
                via_group = via_group.is_some(),
                "adding owner predicate"
            );
            let user = self.target(&owner.relation)?;
            let (alias, column) = self.joins.owner_id_column(from, &owner.relation, user);
            any.push(self.user_id_eq(&alias, &column));
        }
        Ok(())
    }

    fn owner_group_rules(
        &mut self,
        from: &Node<'m>,
        permission: &str,
        any: &mut Disjunction,
    ) -> Result<(), AclError> {
        for group in &from.meta.owner_groups {
            if !group.permissions.has_permission(permission) {
                continue;
            }
            trace!(
                entity = %from.meta.name,
                property = %group.relation.property,
                "adding owner-group predicate"
            );
            let target = self.target(&group.relation)?;
            let node = self.joins.follow(from, &group.relation, target, |_| None);
            self.owner_rules(&node, permission, Some(group), any)?;
        }
        Ok(())
    }

    fn permission_link_rules(
        &mut self,
        from: &Node<'m>,
        permission: &str,
        any: &mut Disjunction,
    ) -> Result<(), AclError> {
        for link in &from.meta.permission_links {
            trace!(
                entity = %from.meta.name,
                property = %link.relation.property,
                "adding permission-link predicate"
            );
            let target = self.target(&link.relation)?;
            let node = self.joins.follow(from, &link.relation, target, |alias| {
                Some(permission_grant_condition(
                    alias,
                    &link.permission_field,
                    permission,
                ))
            });
            self.owner_rules(&node, permission, None, any)?;
            self.owner_group_rules(&node, permission, any)?;
        }
        Ok(())
    }

    fn parent_rules(
        &mut self,
        from: &Node<'m>,
        permission: &str,
        depth: u32,
        any: &mut Disjunction,
    ) -> Result<(), AclError> {
        for parent in &from.meta.parents {
            if !parent.permissions.has_permission(permission) {
                continue;
            }
            let parent_permission = permission::prefixed(&parent.prefix, permission);
            trace!(
                entity = %from.meta.name,
                property = %parent.relation.property,
                parent_permission = %parent_permission,
                "adding parent sub-predicates"
            );
            let target = self.target(&parent.relation)?;
            let node = self.joins.follow(from, &parent.relation, target, |_| None);
            if let Some(cond) = self.compile(&node, &parent_permission, depth - 1)? {
                any.push(cond);
            }
        }
        Ok(())
    }
}
