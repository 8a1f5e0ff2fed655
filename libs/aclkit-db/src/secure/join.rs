use sea_orm::Condition;
use sea_orm::sea_query::{Alias, JoinType, SelectStatement};

use crate::metadata::{AclEntityMetaData, Relation, RelationKind};
use crate::secure::cond::columns_eq;

/// Prefix of the aliases generated for ACL joins.
pub const ALIAS_PREFIX: &str = "acl_";

/// One table instance in the statement: the root table or a left join.
#[derive(Debug, Clone)]
pub struct Node<'m> {
    pub meta: &'m AclEntityMetaData,
    pub alias: String,
}

/// Appends left joins to a statement under `acl_N` aliases.
pub struct Joiner<'s> {
    stmt: &'s mut SelectStatement,
    next: usize,
}

impl<'s> Joiner<'s> {
    pub fn new(stmt: &'s mut SelectStatement) -> Self {
        Self { stmt, next: 0 }
    }

    fn alias(&mut self) -> String {
        let alias = format!("{ALIAS_PREFIX}{}", self.next);
        self.next += 1;
        alias
    }

    fn left_join(&mut self, table: &str, alias: &str, on: Condition) {
        self.stmt
            .join_as(JoinType::LeftJoin, Alias::new(table), Alias::new(alias), on);
    }

    /// Left join the target of `relation` and return it as a new node.
    ///
    /// `extra_on` receives the target alias; its condition is ANDed into the
    /// target's ON clause, so a non-matching target row is nulled out rather
    /// than filtering the source row.
    pub fn follow<'m, F>(
        &mut self,
        from: &Node<'_>,
        relation: &Relation,
        target: &'m AclEntityMetaData,
        extra_on: F,
    ) -> Node<'m>
    where
        F: FnOnce(&str) -> Option<Condition>,
    {
        let alias = self.alias();
        let link = match &relation.kind {
            RelationKind::BelongsTo { column } => {
                columns_eq((&alias, &target.id_column), (&from.alias, column))
            }
            RelationKind::HasOne { column } | RelationKind::HasMany { column } => {
                columns_eq((&alias, column), (&from.alias, &from.meta.id_column))
            }
            RelationKind::ManyToMany {
                via,
                from_column,
                to_column,
            } => {
                let via_alias = self.alias();
                self.left_join(
                    via,
                    &via_alias,
                    Condition::all().add(columns_eq(
                        (&via_alias, from_column),
                        (&from.alias, &from.meta.id_column),
                    )),
                );
                columns_eq((&alias, &target.id_column), (&via_alias, to_column))
            }
        };

        let mut on = Condition::all().add(link);
        if let Some(extra) = extra_on(&alias) {
            on = on.add(extra);
        }
        self.left_join(&target.table, &alias, on);

        Node {
            meta: target,
            alias,
        }
    }

    /// Qualified column holding the owner's identifier.
    ///
    /// A `belongs_to` owner is read straight from `from`; other shapes need
    /// one join (the owner table, or the join table for many-to-many).
    pub fn owner_id_column(
        &mut self,
        from: &Node<'_>,
        relation: &Relation,
        owner: &AclEntityMetaData,
    ) -> (String, String) {
        match &relation.kind {
            RelationKind::BelongsTo { column } => (from.alias.clone(), column.clone()),
            RelationKind::HasOne { column } | RelationKind::HasMany { column } => {
                let alias = self.alias();
                self.left_join(
                    &owner.table,
                    &alias,
                    Condition::all().add(columns_eq(
                        (&alias, column),
                        (&from.alias, &from.meta.id_column),
                    )),
                );
                (alias, owner.id_column.clone())
            }
            RelationKind::ManyToMany {
                via,
                from_column,
                to_column,
            } => {
                let alias = self.alias();
                self.left_join(
                    via,
                    &alias,
                    Condition::all().add(columns_eq(
                        (&alias, from_column),
                        (&from.alias, &from.meta.id_column),
                    )),
                );
                (alias, to_column.clone())
            }
        }
    }
}
