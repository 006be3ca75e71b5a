//! Nickname equivalence groups for first-name matching.

use std::collections::HashMap;

/// Built-in groups of interchangeable English given names.
const STANDARD_GROUPS: &[&[&str]] = &[
    &["alexander", "alex", "al", "sasha", "xander"],
    &["alexandra", "alex", "alexa", "sasha", "sandra"],
    &["albert", "al", "bert", "bertie"],
    &["alfred", "al", "alf", "fred", "freddie"],
    &["andrew", "andy", "drew"],
    &["anthony", "tony", "ant"],
    &["benjamin", "ben", "benny", "benji"],
    &["catherine", "katherine", "kathryn", "cathy", "kathy", "kate", "katie", "kat"],
    &["charles", "charlie", "chuck", "chas"],
    &["christopher", "chris", "topher"],
    &["christine", "christina", "chris", "tina", "chrissy"],
    &["daniel", "dan", "danny"],
    &["david", "dave", "davey"],
    &["edward", "ed", "eddie", "ted", "ned"],
    &["elizabeth", "liz", "lizzie", "beth", "betty", "eliza", "libby"],
    &["frederick", "fred", "freddie", "fritz"],
    &["gregory", "greg"],
    &["jacob", "jake"],
    &["james", "jim", "jimmy", "jamie"],
    &["jennifer", "jen", "jenny"],
    &["john", "jack", "johnny", "jon"],
    &["jonathan", "jon", "jonny", "nathan"],
    &["joseph", "joe", "joey"],
    &["joshua", "josh"],
    &["katherine", "kate", "kathy", "katie", "kat", "kit"],
    &["lawrence", "larry", "laurie"],
    &["margaret", "maggie", "meg", "peggy", "marge", "greta"],
    &["matthew", "matt", "matty"],
    &["michael", "mike", "mikey", "mick", "mickey"],
    &["nicholas", "nick", "nicky", "nico"],
    &["patricia", "pat", "patty", "trish", "tricia"],
    &["patrick", "pat", "paddy"],
    &["peter", "pete"],
    &["rebecca", "becky", "becca"],
    &["richard", "rich", "rick", "ricky", "dick"],
    &["robert", "rob", "robbie", "bob", "bobby", "bert"],
    &["samantha", "sam", "sammy"],
    &["samuel", "sam", "sammy"],
    &["stephen", "steven", "steve", "stevie"],
    &["susan", "sue", "susie", "suzy"],
    &["thomas", "tom", "tommy"],
    &["timothy", "tim", "timmy"],
    &["victoria", "vicky", "tori"],
    &["william", "will", "bill", "billy", "willy", "liam"],
];

/// Immutable lookup of nickname groups.
///
/// A name may belong to several groups (`al` is short for Albert, Alexander
/// and Alfred); two names are equivalent when they share any group.
#[derive(Debug, Clone, Default)]
pub struct NicknameTable {
    groups_by_name: HashMap<String, Vec<usize>>,
}

impl NicknameTable {
    /// Builds a table from explicit groups. Names are lowercased and trimmed.
    pub fn from_groups<G, N>(groups: G) -> Self
    where
        G: IntoIterator<Item = N>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        let mut groups_by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, group) in groups.into_iter().enumerate() {
            for name in group {
                let name = name.as_ref().trim().to_lowercase();
                if name.is_empty() {
                    continue;
                }
                let entry = groups_by_name.entry(name).or_default();
                if !entry.contains(&index) {
                    entry.push(index);
                }
            }
        }
        Self { groups_by_name }
    }

    /// The built-in English nickname table.
    pub fn standard() -> Self {
        Self::from_groups(STANDARD_GROUPS.iter().map(|group| group.iter()))
    }

    /// Whether two distinct given names are known nickname variants.
    pub fn are_equivalent(&self, a: &str, b: &str) -> bool {
        let a = a.trim().to_lowercase();
        let b = b.trim().to_lowercase();
        if a.is_empty() || b.is_empty() || a == b {
            return false;
        }
        match (self.groups_by_name.get(&a), self.groups_by_name.get(&b)) {
            (Some(left), Some(right)) => left.iter().any(|group| right.contains(group)),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.groups_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups_by_name.is_empty()
    }
}
