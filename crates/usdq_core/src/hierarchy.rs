//! Nested prim hierarchy for scene inspection.

use serde::Serialize;

use crate::mesh::face_count;
use crate::usd::{Prim, Stage};

/// One prim and its descendants.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PrimNode {
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Face count, present for meshes with authored topology.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faces: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PrimNode>,
}

impl PrimNode {
    fn build(stage: &Stage, prim: &Prim) -> Self {
        Self {
            path: prim.path.clone(),
            type_name: prim.type_name.clone(),
            faces: face_count(prim),
            children: stage.children(prim).map(|child| Self::build(stage, child)).collect(),
        }
    }

    /// This node and all of its descendants.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(PrimNode::count).sum::<usize>()
    }
}

/// The stage's root prims, each with its subtree.
pub fn prim_tree(stage: &Stage) -> Vec<PrimNode> {
    stage.roots().map(|root| PrimNode::build(stage, root)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::count_prims;
    use crate::usd::Document;
    use serde_json::json;

    const SCENE: &str = r#"#usda 1.0
def Xform "Desk"
{
    def Mesh "Top"
    {
        int[] faceVertexCounts = [4, 4, 4, 4, 4, 4]
    }

    def Scope "Empty"
    {
    }

    over "Ghost"
    {
    }
}

def "Loose"
{
}
"#;

    #[test]
    fn test_tree_shape() {
        let stage = Stage::compose(&Document::from_string(SCENE, "tree.usda").unwrap());
        let tree = prim_tree(&stage);
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            json,
            json!([
                {
                    "path": "/Desk",
                    "type": "Xform",
                    "children": [
                        {"path": "/Desk/Top", "type": "Mesh", "faces": 6},
                        {"path": "/Desk/Empty", "type": "Scope"}
                    ]
                },
                {"path": "/Loose", "type": ""}
            ])
        );
    }

    #[test]
    fn test_tree_covers_every_prim() {
        let stage = Stage::compose(&Document::from_string(SCENE, "tree.usda").unwrap());
        let total: usize = prim_tree(&stage).iter().map(PrimNode::count).sum();
        assert_eq!(total, count_prims(&stage).prim_count);
        assert_eq!(total, 4);
    }
}
