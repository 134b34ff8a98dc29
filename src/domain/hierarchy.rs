use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub company_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    pub customer_id: String,
    #[serde(default)]
    pub department_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub id: String,
    pub code: String,
    #[serde(default)]
    pub service_description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    pub project_id: String,
}

/// The four dependent levels, outermost first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumIter,
)]
pub enum HierarchyLevel {
    #[strum(serialize = "company")]
    Company,
    #[strum(serialize = "customer")]
    Customer,
    #[strum(serialize = "project")]
    Project,
    #[strum(serialize = "work order")]
    WorkOrder,
}

impl HierarchyLevel {
    pub const ALL: [HierarchyLevel; 4] = [
        HierarchyLevel::Company,
        HierarchyLevel::Customer,
        HierarchyLevel::Project,
        HierarchyLevel::WorkOrder,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn parent(self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Company => None,
            HierarchyLevel::Customer => Some(HierarchyLevel::Company),
            HierarchyLevel::Project => Some(HierarchyLevel::Customer),
            HierarchyLevel::WorkOrder => Some(HierarchyLevel::Project),
        }
    }

    pub fn child(self) -> Option<HierarchyLevel> {
        match self {
            HierarchyLevel::Company => Some(HierarchyLevel::Customer),
            HierarchyLevel::Customer => Some(HierarchyLevel::Project),
            HierarchyLevel::Project => Some(HierarchyLevel::WorkOrder),
            HierarchyLevel::WorkOrder => None,
        }
    }

    /// Levels strictly below this one.
    pub fn descendants(self) -> &'static [HierarchyLevel] {
        &Self::ALL[self.index() + 1..]
    }

    /// Levels strictly above this one.
    pub fn ancestors(self) -> &'static [HierarchyLevel] {
        &Self::ALL[..self.index()]
    }
}

/// An option at any level of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "camelCase")]
pub enum HierarchyNode {
    Company(Company),
    Customer(Customer),
    Project(Project),
    WorkOrder(WorkOrder),
}

impl HierarchyNode {
    pub fn level(&self) -> HierarchyLevel {
        match self {
            HierarchyNode::Company(_) => HierarchyLevel::Company,
            HierarchyNode::Customer(_) => HierarchyLevel::Customer,
            HierarchyNode::Project(_) => HierarchyLevel::Project,
            HierarchyNode::WorkOrder(_) => HierarchyLevel::WorkOrder,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            HierarchyNode::Company(c) => &c.id,
            HierarchyNode::Customer(c) => &c.id,
            HierarchyNode::Project(p) => &p.id,
            HierarchyNode::WorkOrder(w) => &w.id,
        }
    }

    /// Display label as shown in the option list.
    pub fn label(&self) -> String {
        match self {
            HierarchyNode::Company(c) => c.name.clone(),
            HierarchyNode::Customer(c) => with_code(&c.name, c.code.as_deref()),
            HierarchyNode::Project(p) => with_code(&p.name, p.code.as_deref()),
            HierarchyNode::WorkOrder(w) => match &w.service_description {
                Some(desc) => format!("{} - {}", w.code, desc),
                None => w.code.clone(),
            },
        }
    }
}

fn with_code(name: &str, code: Option<&str>) -> String {
    match code {
        Some(code) if !code.is_empty() => format!("{} ({})", name, code),
        _ => name.to_string(),
    }
}

/// Ids of the selected ancestors used to scope a level load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyScope {
    pub company_id: Option<String>,
    pub customer_id: Option<String>,
    pub project_id: Option<String>,
}

impl HierarchyScope {
    /// Restricts the scope to what a load of `level` depends on.
    pub fn for_level(&self, level: HierarchyLevel) -> HierarchyScope {
        let keep = |ancestor: HierarchyLevel| level > ancestor;
        HierarchyScope {
            company_id: self.company_id.clone().filter(|_| keep(HierarchyLevel::Company)),
            customer_id: self
                .customer_id
                .clone()
                .filter(|_| keep(HierarchyLevel::Customer)),
            project_id: self.project_id.clone().filter(|_| keep(HierarchyLevel::Project)),
        }
    }
}

/// A resolved chain. Company, customer and project are mandatory; the work
/// order is optional here and enforced by callers that need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyChain {
    pub company: Company,
    pub customer: Customer,
    pub project: Project,
    #[serde(default)]
    pub work_order: Option<WorkOrder>,
}

impl HierarchyChain {
    pub fn department_id(&self) -> Option<&str> {
        self.project.department_id.as_deref()
    }

    pub fn work_order_id(&self) -> Option<&str> {
        self.work_order.as_ref().map(|w| w.id.as_str())
    }
}
