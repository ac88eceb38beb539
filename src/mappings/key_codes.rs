use crate::error::{CornerError, Result};
use once_cell::sync::Lazy;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;

// Статическая карта клавиш, пригодных для сочетания-действия
static KEY_NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> = Lazy::new(|| {
    let mut map = HashMap::new();

    // Модификаторы
    map.insert("leftctrl", 29); // KEY_LEFTCTRL
    map.insert("rightctrl", 97); // KEY_RIGHTCTRL
    map.insert("leftshift", 42); // KEY_LEFTSHIFT
    map.insert("rightshift", 54); // KEY_RIGHTSHIFT
    map.insert("leftalt", 56); // KEY_LEFTALT
    map.insert("rightalt", 100); // KEY_RIGHTALT
    map.insert("leftmeta", 125); // KEY_LEFTMETA
    map.insert("rightmeta", 126); // KEY_RIGHTMETA

    // Синонимы
    map.insert("ctrl", 29);
    map.insert("shift", 42);
    map.insert("alt", 56);
    map.insert("super", 125);
    map.insert("win", 125);

    // Специальные клавиши
    map.insert("tab", 15); // KEY_TAB
    map.insert("escape", 1); // KEY_ESC
    map.insert("space", 57); // KEY_SPACE
    map.insert("enter", 28); // KEY_ENTER
    map.insert("up", 103); // KEY_UP
    map.insert("down", 108); // KEY_DOWN
    map.insert("left", 105); // KEY_LEFT
    map.insert("right", 106); // KEY_RIGHT

    // Буквенные клавиши, которые встречаются в системных сочетаниях
    map.insert("a", 30); // KEY_A
    map.insert("d", 32); // KEY_D
    map.insert("s", 31); // KEY_S
    map.insert("w", 17); // KEY_W

    // Функциональные клавиши
    map.insert("f1", 59);
    map.insert("f2", 60);
    map.insert("f3", 61);
    map.insert("f4", 62);
    map.insert("f5", 63);
    map.insert("f6", 64);
    map.insert("f7", 65);
    map.insert("f8", 66);
    map.insert("f9", 67);
    map.insert("f10", 68);
    map.insert("f11", 87);
    map.insert("f12", 88);

    map
});

const MODIFIER_CODES: [u16; 8] = [29, 97, 42, 54, 56, 100, 125, 126];

/// Маппинг между именами клавиш и кодами evdev
pub struct KeycodeMap;

impl KeycodeMap {
    pub fn get_keycode(key_name: &str) -> Option<u16> {
        KEY_NAME_TO_CODE.get(key_name.trim().to_lowercase().as_str()).copied()
    }

    pub fn is_modifier(code: u16) -> bool {
        MODIFIER_CODES.contains(&code)
    }
}

/// Сочетание клавиш для действия; обычно 2-3 клавиши, поэтому без кучи
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCombo {
    codes: SmallVec<[u16; 4]>,
}

impl KeyCombo {
    pub fn parse(names: &[String]) -> Result<Self> {
        if names.is_empty() {
            return Err(CornerError::Config(anyhow::anyhow!("Пустое сочетание клавиш")));
        }

        let codes = names
            .iter()
            .map(|name| {
                KeycodeMap::get_keycode(name)
                    .ok_or_else(|| CornerError::Config(anyhow::anyhow!("Неизвестная клавиша: '{}'", name)))
            })
            .collect::<Result<SmallVec<[u16; 4]>>>()?;

        Ok(Self { codes })
    }

    /// Порядок нажатия: модификаторы первыми, затем остальные
    pub fn press_order(&self) -> SmallVec<[u16; 4]> {
        let mut ordered: SmallVec<[u16; 4]> = self.codes.iter().copied().filter(|c| KeycodeMap::is_modifier(*c)).collect();
        ordered.extend(self.codes.iter().copied().filter(|c| !KeycodeMap::is_modifier(*c)));
        ordered
    }

    /// Порядок отпускания: обратный нажатию, модификаторы последними
    pub fn release_order(&self) -> SmallVec<[u16; 4]> {
        let mut ordered = self.press_order();
        ordered.reverse();
        ordered
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.codes.iter().map(|c| format!("KEY_{}", c)).collect();
        f.write_str(&parts.join("+"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_key_mapping() {
        assert_eq!(KeycodeMap::get_keycode("tab"), Some(15));
        assert_eq!(KeycodeMap::get_keycode("LeftMeta"), Some(125));
        assert_eq!(KeycodeMap::get_keycode("super"), Some(125));
        assert_eq!(KeycodeMap::get_keycode("nonexistent"), None);
    }

    #[test]
    fn test_combo_orders_modifiers_around_keys() {
        let combo = KeyCombo::parse(&["tab".to_string(), "leftmeta".to_string()]).unwrap();
        assert_eq!(combo.press_order().as_slice(), &[125, 15]);
        assert_eq!(combo.release_order().as_slice(), &[15, 125]);
    }

    #[test]
    fn test_combo_rejects_unknown_and_empty() {
        assert!(KeyCombo::parse(&[]).is_err());
        assert!(KeyCombo::parse(&["hyper".to_string()]).is_err());
    }
}
