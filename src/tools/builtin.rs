//! Demo plugins used by the CLI flows.
//!
//! [`MenuPlugin`] backs the structured single-turn flow (`Menu-get_specials`,
//! `Menu-get_item_price`); [`WeatherPlugin`] backs the interactive chat flow
//! (`Weather-get_weather`). Both return canned strings.
//!
//! ```rust
//! use agent_shim::tools::builtin::{MenuPlugin, WeatherPlugin};
//! use agent_shim::tools::ToolRegistry;
//!
//! let registry = ToolRegistry::new()
//!     .with_plugin(&MenuPlugin)
//!     .and_then(|r| r.with_plugin(&WeatherPlugin))
//!     .unwrap();
//! assert_eq!(registry.len(), 3);
//! ```

use std::sync::Arc;

use super::registry::Plugin;
use crate::tools::tool::{AgentTool, Tool, ToolExecutionContext};
use crate::tools::types::AgentToolParameters;

const SPECIALS: &str = "
Special Soup: Clam Chowder
Special Salad: Cobb Salad
Special Drink: Chai Tea
";

const ITEM_PRICE: &str = "$9.99";

/// Restaurant menu lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuPlugin;

impl Plugin for MenuPlugin {
    fn name(&self) -> &str {
        "Menu"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![get_specials_tool(), get_item_price_tool()]
    }
}

/// `get_specials`: lists today's specials.
pub fn get_specials_tool() -> Arc<dyn Tool> {
    Arc::new(
        AgentTool::new(
            "get_specials",
            "Provides a list of specials from the menu.",
            AgentToolParameters::empty(),
            |_args, _ctx: ToolExecutionContext| async move {
                Ok(serde_json::Value::String(SPECIALS.to_string()))
            },
        )
        .with_returns("Returns the specials from the menu."),
    )
}

/// `get_item_price`: quotes a price for any menu item.
pub fn get_item_price_tool() -> Arc<dyn Tool> {
    Arc::new(
        AgentTool::new(
            "get_item_price",
            "Provides the price of the requested menu item.",
            AgentToolParameters::object()
                .string("menu_item", "The name of the menu item.", true)
                .build(),
            |args, _ctx: ToolExecutionContext| async move {
                args.get_str("menu_item")?;
                Ok(serde_json::Value::String(ITEM_PRICE.to_string()))
            },
        )
        .with_returns("Returns the price of the menu item."),
    )
}

/// City weather lookups.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeatherPlugin;

impl Plugin for WeatherPlugin {
    fn name(&self) -> &str {
        "Weather"
    }

    fn tools(&self) -> Vec<Arc<dyn Tool>> {
        vec![get_weather_tool()]
    }
}

/// `get_weather`: canned weather for Paris and London.
pub fn get_weather_tool() -> Arc<dyn Tool> {
    Arc::new(
        AgentTool::new(
            "get_weather",
            "Gets the weather for a city",
            AgentToolParameters::object()
                .string("city", "The city to look up.", true)
                .build(),
            |args, _ctx: ToolExecutionContext| async move {
                let city = args.get_str("city")?;
                Ok(serde_json::Value::String(weather_report(city)))
            },
        )
        .with_returns("Retrieves the weather for a given city."),
    )
}

fn weather_report(city: &str) -> String {
    let lower = city.to_lowercase();
    if lower.contains("paris") {
        format!("The weather in {city} is 20°C and sunny.")
    } else if lower.contains("london") {
        format!("The weather in {city} is 15°C and cloudy.")
    } else {
        format!("Sorry, I don't have the weather for {city}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolArguments, ToolRegistry};
    use crate::types::AgentToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn specials_list_the_soup() {
        let tool = get_specials_tool();
        let value = tool
            .execute(&ToolArguments::new(json!({})), &ToolExecutionContext::default())
            .await
            .unwrap();
        assert!(value.as_str().unwrap().contains("Special Soup: Clam Chowder"));
    }

    #[tokio::test]
    async fn price_requires_menu_item() {
        let registry = ToolRegistry::new().with_plugin(&MenuPlugin).unwrap();
        let call = AgentToolCall {
            id: "c1".into(),
            name: "Menu-get_item_price".into(),
            arguments: json!({}),
        };
        let err = registry.invoke(&call).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::ShimError::InvalidToolArguments { .. }
        ));
    }

    #[tokio::test]
    async fn price_is_fixed() {
        let registry = ToolRegistry::new().with_plugin(&MenuPlugin).unwrap();
        let call = AgentToolCall {
            id: "c1".into(),
            name: "Menu-get_item_price".into(),
            arguments: json!({ "menu_item": "Clam Chowder" }),
        };
        assert_eq!(registry.invoke(&call).await.unwrap(), json!("$9.99"));
    }

    #[test]
    fn weather_matches_city_case_insensitively() {
        assert_eq!(weather_report("PARIS"), "The weather in PARIS is 20°C and sunny.");
        assert_eq!(
            weather_report("Greater London"),
            "The weather in Greater London is 15°C and cloudy."
        );
        assert_eq!(
            weather_report("Oslo"),
            "Sorry, I don't have the weather for Oslo."
        );
    }

    #[test]
    fn descriptors_carry_return_descriptions() {
        let registry = ToolRegistry::new().with_plugin(&WeatherPlugin).unwrap();
        let descriptors = registry.descriptors();
        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "Weather-get_weather");
        assert_eq!(
            descriptors[0].returns.as_deref(),
            Some("Retrieves the weather for a given city.")
        );
        assert_eq!(descriptors[0].parameters.names(), vec!["city"]);
    }
}
