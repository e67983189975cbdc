//! Inventory tools: items and gold.

use super::{i64_arg, opt_str_arg, opt_u32_arg, str_arg, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

static GIVE_ITEM_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Receiving character" },
            "item_name": { "type": "string", "description": "Item name" },
            "item_type": { "type": "string", "description": "Item category (weapon, consumable, ...)" },
            "quantity": { "type": "integer", "description": "How many (default 1)" }
        },
        "required": ["character_id", "item_name"]
    })
});

static REMOVE_ITEM_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Owning character" },
            "item_name": { "type": "string", "description": "Item name" },
            "quantity": { "type": "integer", "description": "How many to remove (default 1)" }
        },
        "required": ["character_id", "item_name"]
    })
});

static LIST_INVENTORY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Character whose inventory to list" }
        },
        "required": ["character_id"]
    })
});

static ADJUST_GOLD_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "character_id": { "type": "integer", "description": "Character whose gold changes" },
            "amount": { "type": "integer", "description": "Signed gold change (negative to spend)" },
            "reason": { "type": "string", "description": "What the change is for" }
        },
        "required": ["character_id", "amount"]
    })
});

/// Add items to a character's inventory.
pub struct GiveItem;

#[async_trait]
impl Tool for GiveItem {
    fn name(&self) -> &str {
        "give_item"
    }

    fn description(&self) -> &str {
        "Give items to a character. Stacks with items of the same name."
    }

    fn input_schema(&self) -> &Value {
        &GIVE_ITEM_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let item_name = str_arg(&args, "item_name")?;
        let item_type = opt_str_arg(&args, "item_type").unwrap_or("misc");
        let quantity = opt_u32_arg(&args, "quantity")?.unwrap_or(1);

        let stack = ctx
            .storage
            .add_item(character_id, item_name, item_type, quantity)
            .await?;
        Ok(format!(
            "Added {}x {} to inventory (now {} total)",
            quantity, stack.name, stack.quantity
        ))
    }
}

/// Remove items from a character's inventory.
pub struct RemoveItem;

#[async_trait]
impl Tool for RemoveItem {
    fn name(&self) -> &str {
        "remove_item"
    }

    fn description(&self) -> &str {
        "Remove items from a character's inventory by name."
    }

    fn input_schema(&self) -> &Value {
        &REMOVE_ITEM_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let item_name = str_arg(&args, "item_name")?;
        let quantity = opt_u32_arg(&args, "quantity")?.unwrap_or(1);

        ctx.storage.remove_item(character_id, item_name, quantity).await?;
        Ok(format!("Removed {quantity}x {item_name} from inventory"))
    }
}

/// List a character's inventory.
pub struct ListInventory;

#[async_trait]
impl Tool for ListInventory {
    fn name(&self) -> &str {
        "list_inventory"
    }

    fn description(&self) -> &str {
        "List a character's inventory."
    }

    fn input_schema(&self) -> &Value {
        &LIST_INVENTORY_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let items = ctx.storage.inventory(character_id).await?;
        if items.is_empty() {
            return Ok("Inventory is empty.".to_string());
        }

        let mut lines = vec!["**Inventory:**".to_string()];
        for item in items {
            let quantity = if item.quantity > 1 {
                format!(" x{}", item.quantity)
            } else {
                String::new()
            };
            lines.push(format!("- {}{} ({})", item.name, quantity, item.kind));
        }
        Ok(lines.join("\n"))
    }
}

/// Adjust a character's gold.
pub struct AdjustGold;

#[async_trait]
impl Tool for AdjustGold {
    fn name(&self) -> &str {
        "adjust_gold"
    }

    fn description(&self) -> &str {
        "Give or take gold. Taking more than the character has fails."
    }

    fn input_schema(&self) -> &Value {
        &ADJUST_GOLD_SCHEMA
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError> {
        let character_id = i64_arg(&args, "character_id")?;
        let amount = i64_arg(&args, "amount")?;
        let reason = opt_str_arg(&args, "reason").unwrap_or("unspecified");

        let new_total = ctx.storage.adjust_gold(character_id, amount).await?;
        let verb = if amount >= 0 { "Gained" } else { "Spent" };
        Ok(format!(
            "{} {} gold ({}). Total: {} gold",
            verb,
            amount.abs(),
            reason,
            new_total
        ))
    }
}
