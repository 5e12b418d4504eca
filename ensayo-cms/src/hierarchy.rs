//! Content hierarchy model
//!
//! CourseSection → Course → Module → Unit → {ToolGroup, PracticalGroup, Tool}
//!
//! The level set is fixed, so every traversal the cascade needs is a static
//! table on [`NodeKind`] rather than a graph walk.

use ensayo_common::db as models;
use ensayo_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

/// Node type in the content hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    CourseSection,
    Course,
    Module,
    Unit,
    ToolGroup,
    PracticalGroup,
    Tool,
}

use NodeKind::*;

impl NodeKind {
    /// Every kind, root first
    pub const ALL: [NodeKind; 7] = [
        CourseSection,
        Course,
        Module,
        Unit,
        ToolGroup,
        PracticalGroup,
        Tool,
    ];

    pub fn table(self) -> &'static str {
        match self {
            CourseSection => "course_sections",
            Course => "courses",
            Module => "modules",
            Unit => "units",
            ToolGroup => "tool_groups",
            PracticalGroup => "practical_groups",
            Tool => "tools",
        }
    }

    /// Column that descendants use to reference a node of this kind
    pub fn id_column(self) -> &'static str {
        match self {
            CourseSection => "course_section_id",
            Course => "course_id",
            Module => "module_id",
            Unit => "unit_id",
            ToolGroup => "tool_group_id",
            PracticalGroup => "practical_group_id",
            Tool => "tool_id",
        }
    }

    /// JSON name of [`NodeKind::id_column`]
    pub fn id_field(self) -> &'static str {
        match self {
            CourseSection => "courseSectionId",
            Course => "courseId",
            Module => "moduleId",
            Unit => "unitId",
            ToolGroup => "toolGroupId",
            PracticalGroup => "practicalGroupId",
            Tool => "toolId",
        }
    }

    /// Key used in `parentTitles` maps
    pub fn field_key(self) -> &'static str {
        match self {
            CourseSection => "courseSection",
            Course => "course",
            Module => "module",
            Unit => "unit",
            ToolGroup => "toolGroup",
            PracticalGroup => "practicalGroup",
            Tool => "tool",
        }
    }

    /// Key of the array in list responses
    pub fn collection_key(self) -> &'static str {
        match self {
            CourseSection => "courseSections",
            Course => "courses",
            Module => "modules",
            Unit => "units",
            ToolGroup => "toolGroups",
            PracticalGroup => "practicalGroups",
            Tool => "tools",
        }
    }

    /// PascalCase name used in route paths (`addToolGroup`, `getAllToolGroups`)
    pub fn route_name(self) -> &'static str {
        match self {
            CourseSection => "CourseSection",
            Course => "Course",
            Module => "Module",
            Unit => "Unit",
            ToolGroup => "ToolGroup",
            PracticalGroup => "PracticalGroup",
            Tool => "Tool",
        }
    }

    /// Human-readable name for log lines and error messages
    pub fn label(self) -> &'static str {
        match self {
            CourseSection => "course section",
            Course => "course",
            Module => "module",
            Unit => "unit",
            ToolGroup => "tool group",
            PracticalGroup => "practical group",
            Tool => "tool",
        }
    }

    /// Display column searched and reported in `parentTitles`
    pub fn title_column(self) -> &'static str {
        match self {
            Tool => "name",
            _ => "title",
        }
    }

    pub fn parent(self) -> Option<NodeKind> {
        match self {
            CourseSection => None,
            Course => Some(CourseSection),
            Module => Some(Course),
            Unit => Some(Module),
            ToolGroup | PracticalGroup => Some(Unit),
            Tool => Some(ToolGroup),
        }
    }

    /// Ancestor kinds whose ids are stored on this node, root first
    pub fn ancestor_kinds(self) -> &'static [NodeKind] {
        match self {
            CourseSection => &[],
            Course => &[CourseSection],
            Module => &[CourseSection, Course],
            Unit => &[CourseSection, Course, Module],
            ToolGroup | PracticalGroup => &[CourseSection, Course, Module, Unit],
            Tool => &[CourseSection, Course, Module, Unit, ToolGroup],
        }
    }

    /// Descendant kinds in propagation order
    pub fn descendants(self) -> &'static [NodeKind] {
        match self {
            CourseSection => &[Course, Module, Unit, ToolGroup, PracticalGroup, Tool],
            Course => &[Module, Unit, ToolGroup, PracticalGroup, Tool],
            Module => &[Unit, ToolGroup, PracticalGroup, Tool],
            Unit => &[ToolGroup, PracticalGroup, Tool],
            ToolGroup => &[Tool],
            PracticalGroup | Tool => &[],
        }
    }

    /// Tool and practical groups count towards unit completion
    pub fn is_group(self) -> bool {
        matches!(self, ToolGroup | PracticalGroup)
    }

    /// True for kinds that own learner progress (units and everything above)
    pub fn scopes_progress(self) -> bool {
        matches!(self, CourseSection | Course | Module | Unit)
    }

    /// True for kinds whose archive removes module enrollments
    pub fn scopes_enrollments(self) -> bool {
        matches!(self, CourseSection | Course | Module)
    }

    /// True if `other` lies strictly below `self`
    pub fn contains(self, other: NodeKind) -> bool {
        self.descendants().contains(&other)
    }

    /// SQL predicate selecting rows of `target` inside the subtree rooted at
    /// a node of this kind, binding that node's id once
    pub fn subtree_filter(self, target: NodeKind) -> String {
        if self == target {
            "id = ?".to_string()
        } else {
            format!("{} = ?", self.id_column())
        }
    }
}

/// Ancestor references carried by a node
///
/// Only the fields listed in [`NodeKind::ancestor_kinds`] are meaningful for
/// a given kind; the rest are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ancestry {
    #[serde(default)]
    pub course_section_id: Option<Uuid>,
    #[serde(default)]
    pub course_id: Option<Uuid>,
    #[serde(default)]
    pub module_id: Option<Uuid>,
    #[serde(default)]
    pub unit_id: Option<Uuid>,
    #[serde(default)]
    pub tool_group_id: Option<Uuid>,
}

impl Ancestry {
    pub fn get(&self, kind: NodeKind) -> Option<Uuid> {
        match kind {
            CourseSection => self.course_section_id,
            Course => self.course_id,
            Module => self.module_id,
            Unit => self.unit_id,
            ToolGroup => self.tool_group_id,
            PracticalGroup | Tool => None,
        }
    }

    pub fn set(&mut self, kind: NodeKind, id: Option<Uuid>) {
        match kind {
            CourseSection => self.course_section_id = id,
            Course => self.course_id = id,
            Module => self.module_id = id,
            Unit => self.unit_id = id,
            ToolGroup => self.tool_group_id = id,
            PracticalGroup | Tool => {}
        }
    }

    /// The stored reference to the node's parent
    pub fn parent_id(&self, kind: NodeKind) -> Option<Uuid> {
        kind.parent().and_then(|p| self.get(p))
    }

    /// Every ancestor id `kind` needs, root first
    ///
    /// Fails with a validation error naming the first missing field.
    pub fn require(&self, kind: NodeKind) -> Result<Vec<(NodeKind, Uuid)>> {
        kind.ancestor_kinds()
            .iter()
            .map(|&a| {
                self.get(a).map(|id| (a, id)).ok_or_else(|| {
                    Error::Validation(format!("{} is required for a {}", a.id_field(), kind.label()))
                })
            })
            .collect()
    }

    /// Restrict to the fields stored on `kind`
    pub fn for_kind(&self, kind: NodeKind) -> Ancestry {
        let mut scoped = Ancestry::default();
        for &a in kind.ancestor_kinds() {
            scoped.set(a, self.get(a));
        }
        scoped
    }
}

/// Mutable fields of any node, as submitted by the admin forms
///
/// Unused fields for a kind are ignored. Edits are full-field replaces:
/// an absent optional field clears the stored value, except `archived` and
/// `sequenceNumber`, which keep their stored value when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInput {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub simulation_path: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub sequence_number: Option<i64>,
    #[serde(default)]
    pub archived: Option<bool>,
    #[serde(flatten)]
    pub ancestry: Ancestry,
}

/// Value bound into a dynamically built statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(Option<String>),
    Integer(i64),
    Bool(bool),
    Id(Uuid),
}

impl NodeInput {
    /// The title, or name for tools
    pub fn display_name(&self, kind: NodeKind) -> Option<&str> {
        match kind {
            Tool => self.name.as_deref(),
            _ => self.title.as_deref(),
        }
    }

    /// Own columns of `kind` with their new values
    pub fn own_fields(&self, kind: NodeKind) -> Vec<(&'static str, SqlValue)> {
        let text = |v: &Option<String>| SqlValue::Text(v.clone());
        let mut fields = match kind {
            CourseSection => vec![("title", text(&self.title))],
            Course | Module | Unit | ToolGroup => {
                vec![("title", text(&self.title)), ("image", text(&self.image))]
            }
            PracticalGroup => vec![
                ("title", text(&self.title)),
                ("image", text(&self.image)),
                ("simulation_path", text(&self.simulation_path)),
            ],
            Tool => vec![
                ("name", text(&self.name)),
                ("description", text(&self.description)),
                ("model_path", text(&self.model_path)),
            ],
        };
        if kind == Unit {
            if let Some(seq) = self.sequence_number {
                fields.push(("sequence_number", SqlValue::Integer(seq)));
            }
        }
        fields
    }
}

/// Any hierarchy node, serialized as its own camelCase document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    CourseSection(models::CourseSection),
    Course(models::Course),
    Module(models::Module),
    Unit(models::Unit),
    ToolGroup(models::ToolGroup),
    PracticalGroup(models::PracticalGroup),
    Tool(models::Tool),
}

impl Node {
    pub fn from_row(kind: NodeKind, row: &SqliteRow) -> Result<Self> {
        Ok(match kind {
            CourseSection => Node::CourseSection(models::CourseSection::from_row(row)?),
            Course => Node::Course(models::Course::from_row(row)?),
            Module => Node::Module(models::Module::from_row(row)?),
            Unit => Node::Unit(models::Unit::from_row(row)?),
            ToolGroup => Node::ToolGroup(models::ToolGroup::from_row(row)?),
            PracticalGroup => Node::PracticalGroup(models::PracticalGroup::from_row(row)?),
            Tool => Node::Tool(models::Tool::from_row(row)?),
        })
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::CourseSection(_) => CourseSection,
            Node::Course(_) => Course,
            Node::Module(_) => Module,
            Node::Unit(_) => Unit,
            Node::ToolGroup(_) => ToolGroup,
            Node::PracticalGroup(_) => PracticalGroup,
            Node::Tool(_) => Tool,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Node::CourseSection(n) => n.id,
            Node::Course(n) => n.id,
            Node::Module(n) => n.id,
            Node::Unit(n) => n.id,
            Node::ToolGroup(n) => n.id,
            Node::PracticalGroup(n) => n.id,
            Node::Tool(n) => n.id,
        }
    }

    pub fn archived(&self) -> bool {
        match self {
            Node::CourseSection(n) => n.archived,
            Node::Course(n) => n.archived,
            Node::Module(n) => n.archived,
            Node::Unit(n) => n.archived,
            Node::ToolGroup(n) => n.archived,
            Node::PracticalGroup(n) => n.archived,
            Node::Tool(n) => n.archived,
        }
    }

    /// Stored ancestor references
    pub fn ancestry(&self) -> Ancestry {
        let mut a = Ancestry::default();
        match self {
            Node::CourseSection(_) => {}
            Node::Course(n) => {
                a.course_section_id = Some(n.course_section_id);
            }
            Node::Module(n) => {
                a.course_section_id = Some(n.course_section_id);
                a.course_id = Some(n.course_id);
            }
            Node::Unit(n) => {
                a.course_section_id = Some(n.course_section_id);
                a.course_id = Some(n.course_id);
                a.module_id = Some(n.module_id);
            }
            Node::ToolGroup(n) => {
                a.course_section_id = Some(n.course_section_id);
                a.course_id = Some(n.course_id);
                a.module_id = Some(n.module_id);
                a.unit_id = Some(n.unit_id);
            }
            Node::PracticalGroup(n) => {
                a.course_section_id = Some(n.course_section_id);
                a.course_id = Some(n.course_id);
                a.module_id = Some(n.module_id);
                a.unit_id = Some(n.unit_id);
            }
            Node::Tool(n) => {
                a.course_section_id = Some(n.course_section_id);
                a.course_id = Some(n.course_id);
                a.module_id = Some(n.module_id);
                a.unit_id = Some(n.unit_id);
                a.tool_group_id = Some(n.tool_group_id);
            }
        }
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descendants_follow_hierarchy_order() {
        for kind in NodeKind::ALL {
            let descendants = kind.descendants();
            // Each descendant lists the kind among its ancestors
            for d in descendants {
                assert!(
                    d.ancestor_kinds().contains(&kind),
                    "{:?} should reference {:?}",
                    d,
                    kind
                );
            }
            // Shallow first: a descendant's parent is visited before it
            for (i, d) in descendants.iter().enumerate() {
                if let Some(p) = d.parent() {
                    if p != kind {
                        let pos = descendants.iter().position(|x| *x == p).unwrap();
                        assert!(pos < i, "{:?} visited before its parent {:?}", d, p);
                    }
                }
            }
        }
    }

    #[test]
    fn test_ancestor_kinds_end_with_parent() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.ancestor_kinds().last().copied(), kind.parent());
        }
    }

    #[test]
    fn test_practical_group_has_no_descendants() {
        assert!(PracticalGroup.descendants().is_empty());
        assert!(!Unit.contains(Course));
        assert!(Unit.contains(Tool));
    }

    #[test]
    fn test_require_reports_first_missing_field() {
        let ancestry = Ancestry {
            course_section_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let err = ancestry.require(Module).unwrap_err();
        assert!(err.to_string().contains("courseId"), "{}", err);
        assert!(ancestry.require(Course).is_ok());
    }

    #[test]
    fn test_node_input_deserializes_flat_camel_case() {
        let module_id = Uuid::new_v4();
        let input: NodeInput = serde_json::from_value(serde_json::json!({
            "title": "Measuring",
            "moduleId": module_id,
            "sequenceNumber": 3,
            "archived": false,
        }))
        .unwrap();

        assert_eq!(input.ancestry.module_id, Some(module_id));
        assert_eq!(input.sequence_number, Some(3));
        assert_eq!(input.display_name(Unit), Some("Measuring"));
        assert!(input
            .own_fields(Unit)
            .contains(&("sequence_number", SqlValue::Integer(3))));
    }

    #[test]
    fn test_tool_uses_name_column() {
        let input = NodeInput {
            name: Some("Caliper".to_string()),
            ..Default::default()
        };
        assert_eq!(input.display_name(Tool), Some("Caliper"));
        assert_eq!(Tool.title_column(), "name");
        let columns: Vec<_> = input.own_fields(Tool).into_iter().map(|(c, _)| c).collect();
        assert_eq!(columns, vec!["name", "description", "model_path"]);
    }
}
