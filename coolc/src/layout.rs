//! Class layout: tags, tag ranges, field slots and dispatch slots.
//!
//! The table is built once from the whole hierarchy and is read-only after
//! that. Tags come from a pre-order walk of the inheritance tree, so every
//! class owns the contiguous range `[tag, max_child_tag]` of its subtree and a
//! subtype test is a two-sided integer comparison.

use std::collections::HashMap;

use petgraph::{algo::is_cyclic_directed, graph::NodeIndex, Directed, Direction, Graph};

use crate::{
    ast::{Class, Program, SELF_TYPE},
    basic,
};

pub type InheritanceGraph = Graph<String, (), Directed>;

/// Tags index `ClassTable::classes`.
pub type Tag = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: String,
    /// Class that declared the field.
    pub owner: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    /// Class whose body fills the slot; an override replaces the owner in place.
    pub owner: String,
    pub formals: usize,
}

impl Method {
    pub fn label(&self) -> String {
        format!("{}.{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Klass {
    pub name: String,
    pub parent: Option<String>,
    pub tag: Tag,
    pub max_child_tag: Tag,
    /// Inherited fields first, in the parent's order, then own fields.
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// Index in `fields` of the first field this class declares.
    pub own_fields_start: usize,
    pub decl: Class,
}

impl Klass {
    pub fn is_basic(&self) -> bool {
        basic::is_basic(&self.name)
    }

    pub fn own_fields(&self) -> &[Field] {
        &self.fields[self.own_fields_start..]
    }

    pub fn field_slot(&self, name: &str) -> usize {
        match self.fields.iter().rposition(|f| f.name == name) {
            Some(slot) => slot,
            None => panic!("impl bug: class {} has no field {}", self.name, name),
        }
    }

    pub fn method_index(&self, name: &str) -> usize {
        match self.methods.iter().position(|m| m.name == name) {
            Some(idx) => idx,
            None => panic!("impl bug: class {} has no method {}", self.name, name),
        }
    }

    /// `Owner.method` as seen from this class, i.e. after overrides.
    pub fn method_full_name(&self, name: &str) -> String {
        self.methods[self.method_index(name)].label()
    }

    pub fn contains_tag(&self, tag: Tag) -> bool {
        self.tag <= tag && tag <= self.max_child_tag
    }

    pub fn file_name(&self) -> &str {
        &self.decl.file_name
    }
}

#[derive(Debug)]
pub struct ClassTable {
    classes: Vec<Klass>,
    by_name: HashMap<String, Tag>,
}

impl ClassTable {
    /// Lays out every class of `program`. The hierarchy must already be
    /// valid: one root, every parent declared, no cycles.
    pub fn build(program: &Program) -> ClassTable {
        let mut graph = InheritanceGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();
        for class in &program.classes {
            let prev = nodes.insert(&class.name, graph.add_node(class.name.clone()));
            assert!(prev.is_none(), "impl bug: class {} declared twice", class.name);
        }

        let mut roots = vec![];
        for class in &program.classes {
            let node = nodes[class.name.as_str()];
            match &class.parent {
                Some(parent) => {
                    let parent_node = match nodes.get(parent.as_str()) {
                        Some(n) => *n,
                        None => panic!("impl bug: unresolved parent {} of {}", parent, class.name),
                    };
                    graph.add_edge(parent_node, node, ());
                }
                None => roots.push(node),
            }
        }
        assert!(
            !is_cyclic_directed(&graph),
            "impl bug: inheritance graph has a cycle"
        );
        assert_eq!(1, roots.len(), "impl bug: expected exactly one root class");

        let decls: HashMap<&str, &Class> =
            program.classes.iter().map(|c| (c.name.as_str(), c)).collect();
        let mut table = ClassTable {
            classes: Vec::with_capacity(program.classes.len()),
            by_name: HashMap::new(),
        };
        table.visit(&graph, roots[0], None, &decls);
        assert_eq!(
            program.classes.len(),
            table.classes.len(),
            "impl bug: class unreachable from the root"
        );

        tracing::debug!(classes = table.classes.len(), "class layout done");
        table
    }

    fn visit(
        &mut self,
        graph: &InheritanceGraph,
        node: NodeIndex,
        parent: Option<Tag>,
        decls: &HashMap<&str, &Class>,
    ) {
        let decl = decls[graph[node].as_str()];
        let tag = self.classes.len();

        let (mut fields, mut methods) = match parent {
            Some(p) => (self.classes[p].fields.clone(), self.classes[p].methods.clone()),
            None => (vec![], vec![]),
        };
        let own_fields_start = fields.len();
        for (name, ty, _) in decl.attributes() {
            fields.push(Field {
                name: name.into(),
                ty: ty.into(),
                owner: decl.name.clone(),
            });
        }
        for (name, formals, _) in decl.methods() {
            let method = Method {
                name: name.into(),
                owner: decl.name.clone(),
                formals: formals.len(),
            };
            match methods.iter_mut().find(|m| m.name == name) {
                Some(slot) => *slot = method,
                None => methods.push(method),
            }
        }

        self.by_name.insert(decl.name.clone(), tag);
        self.classes.push(Klass {
            name: decl.name.clone(),
            parent: decl.parent.clone(),
            tag,
            max_child_tag: tag,
            fields,
            methods,
            own_fields_start,
            decl: decl.clone(),
        });

        // node indices follow declaration order; petgraph yields neighbors newest first.
        let mut children: Vec<NodeIndex> =
            graph.neighbors_directed(node, Direction::Outgoing).collect();
        children.sort();
        for child in children {
            self.visit(graph, child, Some(tag), decls);
        }
        self.classes[tag].max_child_tag = self.classes.len() - 1;
    }

    pub fn klass(&self, name: &str) -> &Klass {
        match self.by_name.get(name) {
            Some(tag) => &self.classes[*tag],
            None => panic!("impl bug: unknown class {}", name),
        }
    }

    pub fn by_tag(&self, tag: Tag) -> &Klass {
        &self.classes[tag]
    }

    /// `SELF_TYPE` resolves to the class whose code is being generated.
    pub fn resolve<'a>(&'a self, ty: &str, current: &'a Klass) -> &'a Klass {
        if ty == SELF_TYPE {
            current
        } else {
            self.klass(ty)
        }
    }

    /// Classes in tag order: every parent comes before its children.
    pub fn iter(&self) -> impl Iterator<Item = &Klass> {
        self.classes.iter()
    }
}
