pub const USER_COUNT_PER_PAGE: i64 = 10;
pub const RECIPE_COUNT_PER_PAGE: i64 = 10;
pub const SUBSCRIPTION_COUNT_PER_PAGE: i64 = 10;

pub const USERNAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const FIRST_NAME_MAX_LENGTH: usize = 150;
pub const LAST_NAME_MAX_LENGTH: usize = 150;

pub const RECIPE_NAME_MAX_LENGTH: usize = 200;
pub const INGREDIENT_NAME_MAX_LENGTH: usize = 200;
pub const MEASUREMENT_UNIT_MAX_LENGTH: usize = 200;
pub const TAG_NAME_MAX_LENGTH: usize = 200;
pub const TAG_COLOR_MAX_LENGTH: usize = 7;
pub const TAG_SLUG_MAX_LENGTH: usize = 200;

pub const MIN_COOKING_TIME: i32 = 1;
pub const MIN_INGREDIENT_AMOUNT: i32 = 1;

pub const INVALID_CREDENTIALS: &str = "Invalid credentials";
pub const COOKING_TIME_MESSAGE: &str = "Cooking time cannot be less than 1 minute";
pub const INGREDIENT_AMOUNT_MESSAGE: &str = "Ingredient amount cannot be less than 1";
pub const NO_INGREDIENTS_MESSAGE: &str = "Recipe must list at least one ingredient";
pub const NO_TAGS_MESSAGE: &str = "Recipe must carry at least one tag";
pub const SUBSCRIBE_TO_YOURSELF: &str = "Cannot subscribe to yourself";
pub const NO_SUBSCRIPTION: &str = "Cannot unsubscribe from an author you are not subscribed to";

pub const DEFAULT_TAGS: &[(&str, &str, &str)] = &[
    ("Breakfast", "#E26C2D", "breakfast"),
    ("Dinner", "#49B64E", "dinner"),
    ("Supper", "#8775D2", "late_dinner"),
];

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";
pub const SHOPPING_LIST_EMPTY: &str = "Shopping cart is empty";
pub const SHOPPING_LIST_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
