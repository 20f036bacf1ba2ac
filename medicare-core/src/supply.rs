use serde::{Deserialize, Serialize};

use crate::error::{MedicareError, Result};

/// Barcode stored for items created without one.
pub const NO_BARCODE: &str = "<none>";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub price: f64,
    #[serde(rename = "categoryID")]
    pub category_id: String,
    pub stock: i64,
    #[serde(default = "no_barcode")]
    pub barcode: String,
}

fn no_barcode() -> String {
    NO_BARCODE.to_string()
}

/// A blank barcode is stored as the placeholder.
fn normalize_barcode(barcode: String) -> String {
    if barcode.trim().is_empty() {
        no_barcode()
    } else {
        barcode
    }
}

impl Item {
    pub fn has_barcode(&self) -> bool {
        self.barcode != NO_BARCODE
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryFields {
    pub name: Option<String>,
    pub image: Option<String>,
}

impl CategoryFields {
    pub fn into_category(self, id: String) -> Result<Category> {
        match (self.name, self.image) {
            (Some(name), Some(image)) if !name.trim().is_empty() && !image.trim().is_empty() => {
                Ok(Category { id, name, image })
            }
            _ => Err(MedicareError::validation("Invalid request body")),
        }
    }

    pub fn apply(self, category: &mut Category) -> Result<()> {
        if self.name.is_none() && self.image.is_none() {
            return Err(MedicareError::validation("Invalid request body"));
        }
        if let Some(name) = self.name {
            if name.trim().is_empty() {
                return Err(MedicareError::validation("Invalid name"));
            }
            category.name = name;
        }
        if let Some(image) = self.image {
            category.image = image;
        }
        Ok(())
    }
}

/// Item fields accepted on create (all required but barcode) and on patch.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ItemFields {
    pub name: Option<String>,
    pub price: Option<f64>,
    #[serde(rename = "categoryID")]
    pub category_id: Option<String>,
    pub stock: Option<i64>,
    pub barcode: Option<String>,
}

impl ItemFields {
    fn check(&self) -> Result<()> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(MedicareError::validation("Invalid name"));
        }
        if let Some(price) = self.price
            && !(price.is_finite() && price > 0.0)
        {
            return Err(MedicareError::validation("Invalid price"));
        }
        if let Some(stock) = self.stock
            && stock < 0
        {
            return Err(MedicareError::validation("Invalid stock"));
        }
        Ok(())
    }

    pub fn into_item(self, id: String) -> Result<Item> {
        self.check()?;
        match (self.name, self.price, self.category_id, self.stock) {
            (Some(name), Some(price), Some(category_id), Some(stock))
                if !category_id.trim().is_empty() =>
            {
                Ok(Item {
                    id,
                    name,
                    price,
                    category_id,
                    stock,
                    barcode: self.barcode.map_or_else(no_barcode, normalize_barcode),
                })
            }
            _ => Err(MedicareError::validation("Invalid request body")),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.price.is_none()
            && self.category_id.is_none()
            && self.stock.is_none()
            && self.barcode.is_none()
    }

    pub fn apply(self, item: &mut Item) -> Result<()> {
        if self.is_empty() {
            return Err(MedicareError::validation("Invalid request body"));
        }
        self.check()?;
        if let Some(name) = self.name {
            item.name = name;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(category_id) = self.category_id {
            item.category_id = category_id;
        }
        if let Some(stock) = self.stock {
            item.stock = stock;
        }
        if let Some(barcode) = self.barcode {
            item.barcode = normalize_barcode(barcode);
        }
        Ok(())
    }
}

/// One category with its items, as served by the price list.
#[derive(Debug, Clone, Serialize)]
pub struct PriceList {
    #[serde(flatten)]
    pub category: Category,
    pub items: Vec<Item>,
}
