use crate::llm::Message;
use crate::platform::Platform;

pub struct Prompt {
    pub instruction: String,
    pub context: String,
}

impl Prompt {
    pub fn new(instruction: String, context: String) -> Self {
        Self {
            instruction,
            context,
        }
    }

    pub fn build_messages(self) -> Vec<Message> {
        vec![Message::system(self.instruction), Message::user(self.context)]
    }
}

pub const PRODUCT_SEARCH_SYSTEM_PROMPT: &str = r#"You find products for sale on online shopping platforms.
To discover candidate products, start with the search_engine tool.
To read product data, prefer the web_data tool dedicated to the platform; if the platform has no such tool, scrape the page as markdown instead.
Platform product tools such as web_data_bestbuy_products are not search tools: only call them for a product URL you already found through search.
Report every product you found with its title, its product page URL, its rating, its price and its image URL. Use null for anything the platform does not show."#;

pub fn build_product_search_prompt(query: &str, platforms: &[Platform]) -> Prompt {
    let platforms = platforms
        .iter()
        .map(Platform::as_str)
        .collect::<Vec<_>>()
        .join(",");
    Prompt::new(
        PRODUCT_SEARCH_SYSTEM_PROMPT.to_string(),
        format!("{}\n\nPlatforms: {}", query, platforms),
    )
}
