//! 面向用户的提示文案（波兰语界面）。

pub const LOGIN_INVALID_PASSWORD: &str = "Błędne hasło";
pub const LOGIN_LOCKED_OUT: &str = "Zbyt wiele nieudanych prób logowania. Spróbuj ponownie za";
pub const UPLOAD_SUCCESS: &str = "Plik przesłany pomyślnie na Chomika!";
pub const UPLOAD_FAILED: &str = "Błąd uploadu: ";
pub const UNKNOWN_ERROR: &str = "Nieznany błąd";
pub const MISSING_PATH: &str = "Brak ścieżki do pliku";
pub const INVALID_PATH: &str = "Nieprawidłowa ścieżka do pliku";
pub const FILE_NOT_FOUND: &str = "Plik nie istnieje";
pub const FILE_TOO_LARGE: &str = "Plik jest zbyt duży";
pub const MISSING_FILE_FIELD: &str = "Brak pliku w żądaniu";
pub const MISSING_UPLOADER_CONFIG: &str =
    "Błąd: Brak konfiguracji CHOMIK_USERNAME lub CHOMIK_PASSWORD";
pub const ERROR_PREFIX: &str = "Błąd: ";
pub const INTERNAL_ERROR: &str = "Błąd: wewnętrzny błąd serwera";
pub const NOT_FOUND: &str = "Nie znaleziono";
