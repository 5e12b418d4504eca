//! Hierarchy fixtures built through the cascade engine

use ensayo_cms::cascade::CascadeEngine;
use ensayo_cms::hierarchy::{Ancestry, NodeInput, NodeKind};
use uuid::Uuid;

/// One node of every kind, each under the previous level
#[derive(Debug, Clone, Copy)]
pub struct SeedTree {
    pub course_section: Uuid,
    pub course: Uuid,
    pub module: Uuid,
    pub unit: Uuid,
    pub tool_group: Uuid,
    pub practical_group: Uuid,
    pub tool: Uuid,
}

impl SeedTree {
    /// Ancestor references a child of `kind` needs, taken from this tree
    pub fn ancestry(&self, kind: NodeKind) -> Ancestry {
        Ancestry {
            course_section_id: Some(self.course_section),
            course_id: Some(self.course),
            module_id: Some(self.module),
            unit_id: Some(self.unit),
            tool_group_id: Some(self.tool_group),
        }
        .for_kind(kind)
    }

    pub fn id(&self, kind: NodeKind) -> Uuid {
        match kind {
            NodeKind::CourseSection => self.course_section,
            NodeKind::Course => self.course,
            NodeKind::Module => self.module,
            NodeKind::Unit => self.unit,
            NodeKind::ToolGroup => self.tool_group,
            NodeKind::PracticalGroup => self.practical_group,
            NodeKind::Tool => self.tool,
        }
    }
}

pub fn titled(title: &str, ancestry: Ancestry) -> NodeInput {
    NodeInput {
        title: Some(title.to_string()),
        ancestry,
        ..Default::default()
    }
}

pub fn named(name: &str, ancestry: Ancestry) -> NodeInput {
    NodeInput {
        name: Some(name.to_string()),
        ancestry,
        ..Default::default()
    }
}

/// Add a full branch whose titles start with `prefix`
pub async fn seed_tree(engine: &CascadeEngine, prefix: &str) -> SeedTree {
    let add = |kind: NodeKind, input: NodeInput| async move {
        engine
            .add_node(kind, input)
            .await
            .unwrap_or_else(|e| panic!("Should add {}: {}", kind.label(), e))
            .id()
    };

    let course_section = add(
        NodeKind::CourseSection,
        titled(&format!("{} Section", prefix), Ancestry::default()),
    )
    .await;
    let mut ancestry = Ancestry {
        course_section_id: Some(course_section),
        ..Default::default()
    };

    let course = add(NodeKind::Course, titled(&format!("{} Course", prefix), ancestry)).await;
    ancestry.course_id = Some(course);

    let module = add(NodeKind::Module, titled(&format!("{} Module", prefix), ancestry)).await;
    ancestry.module_id = Some(module);

    let unit = add(NodeKind::Unit, titled(&format!("{} Unit", prefix), ancestry)).await;
    ancestry.unit_id = Some(unit);

    let tool_group = add(
        NodeKind::ToolGroup,
        titled(&format!("{} Tool Group", prefix), ancestry),
    )
    .await;
    let practical_group = add(
        NodeKind::PracticalGroup,
        titled(&format!("{} Practical", prefix), ancestry),
    )
    .await;
    ancestry.tool_group_id = Some(tool_group);

    let tool = add(NodeKind::Tool, named(&format!("{} Tool", prefix), ancestry)).await;

    SeedTree {
        course_section,
        course,
        module,
        unit,
        tool_group,
        practical_group,
        tool,
    }
}
