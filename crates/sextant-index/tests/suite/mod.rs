mod fold_properties;
mod symbol_at;
