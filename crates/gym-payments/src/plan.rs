//! Membership Plans
//!
//! Plan catalogue behind a read-only store trait.

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// A membership plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,

    /// Price in VND per period
    pub price: Decimal,

    /// Billing period label
    pub period: String,

    #[serde(default)]
    pub perks: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

impl Plan {
    /// Order description sent to the gateway
    pub fn order_info(&self) -> String {
        format!("Thanhtoan{}", self.name)
    }
}

fn plan(id: &str, name: &str, price: Decimal, perks: &[&str], description: &str) -> Plan {
    Plan {
        id: id.into(),
        name: name.into(),
        price,
        period: "tháng".into(),
        perks: perks.iter().map(|p| (*p).to_string()).collect(),
        description: Some(description.into()),
    }
}

/// Built-in catalogue, used when no plan table is configured
pub fn default_plans() -> Vec<Plan> {
    vec![
        plan(
            "starter",
            "GymX Starter",
            dec!(299000),
            &[
                "Truy cập phòng gym giờ hành chính",
                "Theo dõi lịch tập trên ứng dụng",
                "01 buổi tư vấn thể trạng",
            ],
            "Gói phù hợp người mới bắt đầu làm quen với phòng gym.",
        ),
        plan(
            "standard",
            "GymX Standard",
            dec!(499000),
            &[
                "Truy cập phòng gym không giới hạn",
                "02 buổi PT cá nhân/tháng",
                "Tham gia lớp nhóm miễn phí",
            ],
            "Giải pháp cân bằng giữa chi phí và tiện ích nâng cao.",
        ),
        plan(
            "pro",
            "GymX Pro",
            dec!(799000),
            &[
                "Quyền sử dụng 24/7 tất cả cơ sở",
                "04 buổi PT cá nhân/tháng",
                "Ưu đãi 15% dịch vụ bổ sung",
            ],
            "Toàn bộ đặc quyền cao cấp cho hội viên GymX.",
        ),
    ]
}

/// Plan storage trait
pub trait PlanStore: Send + Sync {
    /// Get plan by id
    fn get(&self, id: &str) -> Result<Option<Plan>>;

    /// All plans, cheapest first
    fn list(&self) -> Result<Vec<Plan>>;
}

/// In-memory plan store
pub struct MemoryPlanStore {
    plans: RwLock<HashMap<String, Plan>>,
}

impl Default for MemoryPlanStore {
    fn default() -> Self {
        Self::with_plans(default_plans())
    }
}

impl MemoryPlanStore {
    pub fn with_plans(plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            plans: RwLock::new(plans.into_iter().map(|p| (p.id.clone(), p)).collect()),
        }
    }
}

impl PlanStore for MemoryPlanStore {
    fn get(&self, id: &str) -> Result<Option<Plan>> {
        let plans = self
            .plans
            .read()
            .map_err(|_| PaymentError::Storage("plan store lock poisoned".into()))?;
        Ok(plans.get(id).cloned())
    }

    fn list(&self) -> Result<Vec<Plan>> {
        let plans = self
            .plans
            .read()
            .map_err(|_| PaymentError::Storage("plan store lock poisoned".into()))?;

        let mut all: Vec<Plan> = plans.values().cloned().collect();
        all.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }
}
