//! Traditional → simplified folding.
//!
//! The two corpora were written in different scripts (raw transcripts in
//! simplified, curated documents mostly in traditional), so every character
//! is folded onto its simplified form before any comparison. The built-in
//! table covers the vocabulary of the corpora; config can add more.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Space-separated `traditional simplified` pairs.
const PAIRS: &str = concat!(
    "換换 轉转 暢畅 別别 彎弯 後后 腳脚 髖髋 壓压 擰拧 團团 側侧 軸轴 開开 關关 頭头 這这 ",
    "麼么 個个 們们 練练 習习 試试 與与 時时 間间 過过 還还 進进 階阶 礎础 誤误 ",
    "題题 說说 話话 讓让 於于 從从 對对 應应 變变 動动 體体 穩稳 點点 線线 視视 ",
    "覺觉 準准 備备 級级 導导 勢势 態态 樣样 細细 節节 雙双 蓋盖 臟脏 髒脏 衝冲 ",
    "陸陆 場场 樹树 藍蓝 綠绿 爛烂 碼码 減减 當当 會会 發发 髮发 現现 實实 際际 ",
    "問问 為为 隨随 彈弹 躍跃 騰腾 擺摆 帶带 傾倾 鬆松 緊紧 張张 長长 遠远 邊边 ",
    "處处 結结 構构 錯错 頓顿 決决 順顺 鐘钟 輕轻 負负 載载 並并 單单 齊齐 幫帮 ",
    "機机 記记 憶忆 聽听 讀读 寫写 學学 員员 隊队 師师 課课 類类 書书 見见 觀观 ",
    "衛卫 標标 簡简 驗验 檢检 確确 認认 識识 複复 復复 雜杂 種种 較较 畫画 圖图 ",
    "專专 業业 術术 維维 護护 強强 氣气 風风 東东 區区 陽阳 陰阴 靈灵 腦脑 膽胆 ",
    "臉脸 幾几 萬万 億亿 兩两 號号 價价 錢钱 買买 賣卖 車车 輪轮 軌轨 蹤踪 跡迹 ",
    "蹟迹 斷断 續续 裏里 裡里 麵面 鬥斗 醫医 藥药 歲岁 屬属 據据 舊旧 門门 閃闪 ",
    "闊阔 隻只 難难 離离 電电 靜静 須须 頂顶 項项 預预 領领 頻频 額额 顏颜 願愿 ",
    "顯显 飛飞 飯饭 餘余 館馆 馬马 駕驾 驚惊 鬧闹 魚鱼 鳥鸟 齒齿 龍龙 訓训 設设 ",
    "計计 許许 論论 調调 談谈 請请 諾诺 謝谢 證证 讚赞 財财 責责 貨货 質质 費费 ",
    "資资 賽赛 趕赶 趨趋 踐践 輛辆 輸输 辦办 農农 運运 遊游 達达 遲迟 適适 選选 ",
    "遺遗 鄉乡 針针 鋼钢 錄录 鏡镜 陣阵 陳陈 險险 隱隐 雖虽 雲云 韌韧 響响 頁页 ",
    "頸颈 鍛锻 煉炼 極极 樓楼 槍枪 歡欢 殘残 溝沟 滅灭 滿满 漸渐 濕湿 灣湾 燈灯 ",
    "爐炉 牆墙 獎奖 環环 產产 畢毕 異异 療疗 盡尽 監监 盤盘 眾众 礙碍 禮礼 窮穷 ",
    "競竞 筆笔 範范 築筑 簽签 糾纠 紀纪 約约 紅红 純纯 紙纸 終终 組组 絕绝 給给 ",
    "統统 絲丝 經经 綁绑 網网 緒绪 緣缘 編编 緩缓 縮缩 總总 繃绷 繞绕 織织 繼继 ",
    "罰罚 義义 聯联 聲声 職职 脫脱 腫肿 膚肤 臨临 舉举 藝艺 蘭兰 蟲虫 補补 裝装 ",
    "襪袜 覽览 訊讯 訪访 評评 詩诗 該该 詳详 誇夸 誰谁 講讲 謂谓 譯译 議议 豐丰 ",
    "貓猫 貼贴 貴贵 賞赏 贏赢 軟软 輔辅 辭辞 邏逻 輯辑 釋释 鍵键 鎖锁 鐵铁 閱阅 ",
    "雞鸡 韓韩 顧顾 飄飘 養养 驅驱 驟骤 麥麦 黃黄 齡龄 擊击 撐撑 擋挡 擠挤 擴扩 ",
    "攝摄 敵敌 數数 曬晒 條条 棄弃 榮荣 樂乐 橫横 檔档 欄栏 權权 歷历 歸归 滾滚 ",
    "滯滞 漲涨 澀涩 灑洒 熱热 爭争 獨独 狀状 獲获 盜盗 稱称 積积 糧粮 縱纵 繩绳 ",
    "羅罗 聞闻 臺台 興兴 艱艰 華华 葉叶 薦荐 虛虚 製制 觸触 訂订 詞词 語语 軍军 ",
    "轟轰 辯辩 鈴铃 鍋锅 閒闲 韻韵 飽饱 騎骑 鬍胡 鹽盐 黨党 撥拨 擁拥 搖摇 鑽钻 ",
    "窩窝 壞坏 塊块 墊垫 壯壮 夢梦 夠够 奪夺 奮奋 寬宽 寶宝 層层 島岛 帥帅 廣广 ",
    "廳厅 徑径 徵征 憂忧 懷怀 懸悬 戰战 戲戏 拋抛 掃扫 掛挂 採采 揚扬 損损 搶抢 ",
    "撲扑 擇择 擔担 穫获 騷骚 靂雳 顛颠 參参 嗎吗 啟启 喚唤 嚴严 園园 圍围 夾夹 ",
    "奧奥 妝妆 娛娱 嬰婴 孫孙 寧宁 將将 尋寻 屆届 崗岗 幣币 廢废 彥彦 徹彻 愛爱 ",
    "慣惯 慮虑 憑凭 懶懒 戀恋 掙挣 揮挥 攤摊 敘叙 斂敛 昇升 曉晓 暫暂 曆历 棧栈 ",
    "歐欧 沒没 潔洁 瀏浏 無无 煩烦 爾尔 猶犹 瘋疯 皺皱 禪禅 穀谷 窯窑 筍笋 緻致 ",
    "縣县 繳缴 纏缠 罷罢 聳耸 腸肠 膠胶 艙舱 蔥葱 蘆芦 衆众 襯衬 規规 訴诉 診诊 ",
    "誌志 誠诚 謀谋 豎竖 賬账 賴赖 蹺跷 輩辈 迴回 週周 遙遥 遞递 鄰邻 醞酝 釀酿 ",
    "鉤钩 銳锐 鋪铺 鍊链 鏈链 閉闭 閘闸 闖闯 霧雾 韋韦 頒颁 頗颇 頰颊 頹颓 顆颗 ",
    "颱台 飢饥 飾饰 餅饼 駛驶 騙骗 驕骄 鬱郁 鹹咸 麗丽 黴霉 龐庞"
);

static BUILTIN: LazyLock<HashMap<char, char>> = LazyLock::new(|| {
    PAIRS
        .split_whitespace()
        .filter_map(|pair| {
            let mut chars = pair.chars();
            Some((chars.next()?, chars.next()?))
        })
        .collect()
});

/// Built-in table plus configured extras.
#[derive(Debug, Clone)]
pub struct ScriptFolder {
    extra: HashMap<char, char>,
}

impl ScriptFolder {
    pub fn new(extra: &[(char, char)]) -> Self {
        Self {
            extra: extra.iter().copied().collect(),
        }
    }

    pub fn fold(&self, c: char) -> char {
        self.extra
            .get(&c)
            .or_else(|| BUILTIN.get(&c))
            .copied()
            .unwrap_or(c)
    }
}

impl Default for ScriptFolder {
    fn default() -> Self {
        Self::new(&[])
    }
}
