//! Built-in catalog served when no external source is configured or the
//! configured one is unavailable.

use async_trait::async_trait;
use shopwise_core::catalog::CatalogSource;
use shopwise_core::domain::{Item, ItemId};
use shopwise_core::errors::CatalogError;

#[allow(clippy::too_many_arguments)]
fn item(
    id: u64,
    name: &str,
    description: &str,
    price: f64,
    category: &str,
    rating: f64,
    features: [&str; 4],
    image: &str,
) -> Item {
    Item {
        id: ItemId(id),
        name: name.to_string(),
        description: description.to_string(),
        price,
        category: category.to_string(),
        rating,
        features: features.iter().map(|tag| tag.to_string()).collect(),
        image: Some(format!("https://images.unsplash.com/{image}?auto=format&fit=crop&w=1000&q=80")),
    }
}

pub fn static_items() -> Vec<Item> {
    vec![
        item(
            1,
            "Premium Wireless Headphones",
            "Immerse yourself in crystal-clear sound with our premium wireless headphones featuring noise cancellation technology.",
            199.99,
            "electronics",
            4.8,
            ["Noise cancellation", "40-hour battery life", "Bluetooth 5.0", "Built-in microphone"],
            "photo-1505740420928-5e560c06d30e",
        ),
        item(
            2,
            "Smart Fitness Watch",
            "Track your fitness goals with our advanced smart watch featuring heart rate monitoring, sleep tracking, and more.",
            149.99,
            "electronics",
            4.6,
            ["Heart rate monitor", "Sleep tracking", "Water resistant", "7-day battery life"],
            "photo-1523275335684-37898b6baf30",
        ),
        item(
            3,
            "Ergonomic Office Chair",
            "Work in comfort with our ergonomic office chair designed to provide optimal support for long working hours.",
            249.99,
            "furniture",
            4.5,
            ["Adjustable height", "Lumbar support", "Breathable mesh", "360° swivel"],
            "photo-1505843513577-22bb7d21e455",
        ),
        item(
            4,
            "Professional DSLR Camera",
            "Capture stunning photos and videos with our professional-grade DSLR camera with advanced features.",
            899.99,
            "electronics",
            4.9,
            ["24.1 MP sensor", "4K video recording", "Wi-Fi connectivity", "3-inch LCD screen"],
            "photo-1516035069371-29a1b244cc32",
        ),
        item(
            5,
            "Minimalist Desk Lamp",
            "Add style and functionality to your workspace with our minimalist desk lamp featuring adjustable brightness.",
            59.99,
            "home",
            4.3,
            ["Adjustable brightness", "Touch control", "USB charging port", "Energy efficient"],
            "photo-1507473885765-e6ed057f782c",
        ),
        item(
            6,
            "Organic Cotton T-Shirt",
            "Stay comfortable and eco-friendly with our 100% organic cotton t-shirt available in various colors.",
            29.99,
            "clothing",
            4.4,
            ["100% organic cotton", "Eco-friendly", "Multiple colors", "Sizes XS-XXL"],
            "photo-1521572163474-6864f9cf17ab",
        ),
        item(
            7,
            "Stainless Steel Water Bottle",
            "Stay hydrated on the go with our durable stainless steel water bottle that keeps drinks cold for 24 hours.",
            34.99,
            "home",
            4.7,
            ["24-hour cold retention", "BPA-free", "Leak-proof", "500ml capacity"],
            "photo-1602143407151-7111542de6e8",
        ),
        item(
            8,
            "Wireless Charging Pad",
            "Charge your devices effortlessly with our sleek wireless charging pad compatible with all Qi-enabled devices.",
            39.99,
            "electronics",
            4.2,
            ["Fast charging", "Qi-compatible", "LED indicator", "Anti-slip surface"],
            "photo-1608751819407-8c8672b95444",
        ),
        item(
            9,
            "Leather Messenger Bag",
            "Carry your essentials in style with our genuine leather messenger bag featuring multiple compartments.",
            129.99,
            "accessories",
            4.6,
            ["Genuine leather", "Multiple compartments", "Adjustable strap", "Laptop sleeve"],
            "photo-1548036328-c9fa89d128fa",
        ),
        item(
            10,
            "Smart Home Security Camera",
            "Keep your home secure with our smart security camera featuring motion detection and night vision.",
            89.99,
            "electronics",
            4.5,
            ["1080p HD video", "Motion detection", "Night vision", "Two-way audio"],
            "photo-1558002038-1055907df827",
        ),
        item(
            11,
            "Ceramic Coffee Mug Set",
            "Enjoy your morning coffee with our set of 4 ceramic mugs featuring minimalist design and comfortable handles.",
            49.99,
            "home",
            4.3,
            ["Set of 4", "Dishwasher safe", "Microwave safe", "12oz capacity"],
            "photo-1514228742587-6b1558fcca3d",
        ),
        item(
            12,
            "Portable Bluetooth Speaker",
            "Take your music anywhere with our portable Bluetooth speaker featuring powerful sound and waterproof design.",
            79.99,
            "electronics",
            4.4,
            ["Waterproof", "10-hour battery life", "Bluetooth 5.0", "Built-in microphone"],
            "photo-1608043152269-423dbba4e7e1",
        ),
    ]
}

/// Serves [`static_items`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticCatalog;

#[async_trait]
impl CatalogSource for StaticCatalog {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_items(&self) -> Result<Vec<Item>, CatalogError> {
        Ok(static_items())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::static_items;

    #[test]
    fn static_items_are_valid_and_unique() {
        let items = static_items();
        assert_eq!(items.len(), 12);

        let ids: HashSet<u64> = items.iter().map(|item| item.id.0).collect();
        assert_eq!(ids.len(), items.len());
        for item in &items {
            assert_eq!(item.validate(), Ok(()), "item {} should be valid", item.id);
            assert_eq!(item.features.len(), 4);
        }
    }

    #[test]
    fn static_items_span_five_categories() {
        let categories: HashSet<String> =
            static_items().into_iter().map(|item| item.category).collect();
        assert_eq!(categories.len(), 5);
    }
}
