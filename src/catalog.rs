use std::path::PathBuf;

use crate::transfer::ReplacePolicy;

/// Launcher's own version endpoint.
pub const LAUNCHER_VERSION_URL: &str = "https://www.dropbox.com/scl/fi/lysl6oaum1jnfyb6xalfn/Launcher_Version.txt?rlkey=19tn1jcxg7ksnl360v9sn8bx1&st=txzoxryj&dl=1";
/// Launcher's own update archive.
pub const LAUNCHER_ARCHIVE_URL: &str = "https://www.dropbox.com/scl/fi/5slcwwnd7ni8k72f5aq6e/NexusLauncher.zip?rlkey=40fis5afyyskyc1rr7fa8bzb4&st=4irw3eq2&dl=1";

/// Static description of an installable game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameDescriptor {
    pub name: String,
    pub exe_relative_path: PathBuf,
    pub version_url: String,
    pub archive_url: String,
    pub policy: ReplacePolicy,
}

/// Cubical - shipped as a Unity build tree, updated in place.
/// DeadWrong - flat build, wiped before every update so removed assets disappear.
pub fn builtin_games() -> Vec<GameDescriptor> {
    vec![
        GameDescriptor {
            name: "Cubical".to_string(),
            exe_relative_path: ["Builds", "Windows", "x32", "Test Game.exe"].iter().collect(),
            version_url: "https://www.dropbox.com/scl/fi/rh7mrsu9o6daxbdajfolt/Version.txt?rlkey=e8dfthq1wikkyvo41mhl95230&st=iak87mxt&dl=1".to_string(),
            archive_url: "https://www.dropbox.com/scl/fi/hrqeg43jaot31g671hu0c/Cubical.zip?rlkey=7kcuqn1faaj2me444164n4z5p&st=5sf2doeo&dl=1".to_string(),
            policy: ReplacePolicy::Incremental,
        },
        GameDescriptor {
            name: "DeadWrong".to_string(),
            exe_relative_path: PathBuf::from("DeadWrong.exe"),
            version_url: "https://www.dropbox.com/scl/fi/htxcicm2aiwuc45fhn9be/DWVersion.txt?rlkey=13nv7tdylr5n5bx0v91mg6fan&st=vtn7omkt&dl=1".to_string(),
            archive_url: "https://www.dropbox.com/scl/fi/d6q2oupmbeqtuxhru0suc/DeadWrong.zip?rlkey=vdhfkcn1gyfaje7u35hyupk3l&st=3sxkvvcb&dl=1".to_string(),
            policy: ReplacePolicy::WipeAndReplace,
        },
    ]
}

/// Look a game up by name, ignoring case.
pub fn find(name: &str) -> Option<GameDescriptor> {
    builtin_games()
        .into_iter()
        .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find("cubical").unwrap().name, "Cubical");
        assert_eq!(find(" DEADWRONG ").unwrap().policy, ReplacePolicy::WipeAndReplace);
        assert!(find("Minesweeper").is_none());
    }

    #[test]
    fn names_are_unique() {
        let games = builtin_games();
        for (i, a) in games.iter().enumerate() {
            for b in &games[i + 1..] {
                assert!(!a.name.eq_ignore_ascii_case(&b.name));
            }
        }
    }

    #[test]
    fn cubical_exe_is_nested() {
        let cubical = find("Cubical").unwrap();
        assert_eq!(cubical.exe_relative_path.components().count(), 4);
        assert_eq!(cubical.exe_relative_path.file_name().unwrap(), "Test Game.exe");
    }
}
