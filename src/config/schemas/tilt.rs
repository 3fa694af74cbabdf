/// Order sizing (risk tilt) configuration
use crate::config_struct;
use crate::ensure_config;
use crate::errors::RiskResult;
use std::collections::HashMap;

config_struct! {
    pub struct TiltConfig {
        /// Symbol -> correlated symbol whose position caps it
        hedge_pairs: HashMap<String, String> = HashMap::from([
            ("ES".to_string(), "NQ".to_string()),
            ("NQ".to_string(), "ES".to_string()),
        ]),
        /// Apply the breadth multiplier to sized orders
        breadth_enabled: bool = true,
        /// Deny orders when the drift monitor vetoes trading
        drift_gate_enabled: bool = true,
        /// Largest quantity a sized order may carry
        max_order_quantity: u32 = 10,
    }
}

impl TiltConfig {
    pub fn validate(&self) -> RiskResult<()> {
        for (symbol, paired) in &self.hedge_pairs {
            ensure_config!(
                !symbol.eq_ignore_ascii_case(paired),
                "tilt.hedge_pairs",
                "{} cannot be paired with itself",
                symbol
            );
        }
        ensure_config!(
            self.max_order_quantity > 0,
            "tilt.max_order_quantity",
            "must be positive"
        );
        Ok(())
    }
}
